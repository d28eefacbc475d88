//! Convenience entry points running an ad-hoc flow once.

use crate::core::TaskManager;
use crate::error::TaskError;
use crate::flows::flow::{FlowTask, Strategy};
use crate::flows::spec::{FlowEntry, FlowSpec};
use crate::flows::strategy::{Parallel, Series};
use crate::observer::TaskObserver;

/// Runs `spec` once with strategy `S`, without registering anything.
///
/// The run is named after the strategy (`"series"`, `"parallel"`, ...).
pub async fn run_flow<S: Strategy>(
    manager: &TaskManager,
    spec: FlowSpec,
) -> Result<TaskObserver, TaskError> {
    manager.run_once(FlowTask::<S>::preset(spec), Vec::new()).await
}

/// Runs the given tasks one after another.
///
/// Entries may be registered names or ad-hoc classes such as
/// [`TaskClass::from_fn`](crate::TaskClass::from_fn) closures.
///
/// ```rust
/// use serde_json::json;
/// use tasklane::{TaskClass, TaskManager, run_series};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tasklane::TaskError> {
/// let manager = TaskManager::new();
/// let observer = run_series(&manager, [
///     TaskClass::from_fn(|_ctx, _args| async { Ok(json!(777)) }),
///     TaskClass::from_fn(|_ctx, _args| async { Ok(json!(888)) }),
/// ])
/// .await?;
/// assert_eq!(observer.result().await?, json!([777, 888]));
/// # Ok(())
/// # }
/// ```
pub async fn run_series<I>(manager: &TaskManager, tasks: I) -> Result<TaskObserver, TaskError>
where
    I: IntoIterator,
    I::Item: Into<FlowEntry>,
{
    let spec = FlowSpec::new(tasks);
    run_flow::<Series>(manager, spec).await
}

/// Runs the given tasks concurrently; the result is keyed by task key.
pub async fn run_parallel<I>(manager: &TaskManager, tasks: I) -> Result<TaskObserver, TaskError>
where
    I: IntoIterator,
    I::Item: Into<FlowEntry>,
{
    let spec = FlowSpec::new(tasks);
    run_flow::<Parallel>(manager, spec).await
}
