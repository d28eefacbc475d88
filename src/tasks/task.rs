//! # Task abstraction.
//!
//! A [`Task`] is a polymorphic unit of work with a single template method
//! ([`Task::run`], defaulting to [`Task::main`]) and optional cooperative
//! [`suspend`](Task::suspend) / [`resume`](Task::resume) / [`cancel`](Task::cancel)
//! hooks. The manager owns instantiation: regular tasks get a fresh instance
//! per run, singleton tasks share one instance across every run.
//!
//! Methods take `&self` because a singleton instance is driven by several runs
//! at once; state that changes during a run lives behind interior mutability.

use std::any::Any;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;
use crate::tasks::context::TaskContext;
use crate::tasks::meta::TaskMeta;
use crate::tasks::signal::Signal;

/// Positional arguments passed to a task run.
pub type Args = Vec<Value>;

/// Settled outcome of a task run.
pub type TaskResult = Result<Value, TaskError>;

/// # Asynchronous unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::{Value, json};
/// use tasklane::{Args, Task, TaskContext, TaskResult};
///
/// #[derive(Default)]
/// struct Echo;
///
/// #[async_trait]
/// impl Task for Echo {
///     async fn main(&self, _ctx: &TaskContext, args: Args) -> TaskResult {
///         Ok(args.into_iter().next().unwrap_or(Value::Null))
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Any + Send + Sync {
    /// The work itself. The default implementation fails with
    /// [`TaskError::NotImplemented`].
    async fn main(&self, ctx: &TaskContext, args: Args) -> TaskResult {
        let _ = (ctx, args);
        Err(TaskError::NotImplemented {
            task: std::any::type_name::<Self>().to_string(),
        })
    }

    /// Entry point invoked by the runtime.
    ///
    /// Override this instead of [`main`](Task::main) when the task needs its own
    /// lifecycle (e.g. a loop that parks itself on suspension).
    async fn run(&self, ctx: &TaskContext, args: Args) -> TaskResult {
        self.main(ctx, args).await
    }

    /// Cooperative suspension request. The task settles `signal` once it has
    /// reached a safe paused state.
    ///
    /// Only called for definitions registered with `suspendable`. The default
    /// drops the signal, which the observer reports as [`TaskError::SignalDropped`].
    fn suspend(&self, ctx: &TaskContext, signal: Signal) {
        let _ = (ctx, signal);
    }

    /// Cooperative resumption request; settle `signal` once running again.
    fn resume(&self, ctx: &TaskContext, signal: Signal) {
        let _ = (ctx, signal);
    }

    /// Cooperative cancellation request; settle `signal` once it is safe to stop.
    ///
    /// Only called for definitions registered with `cancelable`. The run still
    /// settles through [`run`](Task::run), with whatever value the task decides.
    fn cancel(&self, ctx: &TaskContext, signal: Signal) {
        let _ = (ctx, signal);
    }

    /// Compensating action run after a failed run, before the observer settles.
    ///
    /// An `Err` here is logged and published as `UndoFailed`; the caller still
    /// observes the original failure.
    async fn undo(&self, ctx: &TaskContext, error: &TaskError) -> Result<(), TaskError> {
        let _ = (ctx, error);
        Ok(())
    }

    /// Static registration defaults (name, tag, capabilities, ...).
    ///
    /// Read once by [`TaskClass::of`](crate::TaskClass::of); explicit call-site
    /// options always win.
    fn meta() -> TaskMeta
    where
        Self: Sized,
    {
        TaskMeta::default()
    }
}

impl dyn Task {
    /// Returns the concrete task if it is a `T`.
    pub fn downcast_ref<T: Task>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }

    /// Returns `true` if the concrete task is a `T`.
    pub fn is<T: Task>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Bare;

    #[async_trait]
    impl Task for Bare {}

    #[derive(Default)]
    struct Echo;

    #[async_trait]
    impl Task for Echo {
        async fn main(&self, _ctx: &TaskContext, args: Args) -> TaskResult {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn default_main_is_not_implemented() {
        let ctx = TaskContext::detached("bare");
        let err = Bare.run(&ctx, vec![]).await.unwrap_err();
        assert!(matches!(err, TaskError::NotImplemented { ref task } if task.ends_with("Bare")));
    }

    #[tokio::test]
    async fn run_delegates_to_main() {
        let ctx = TaskContext::detached("echo");
        assert_eq!(Echo.run(&ctx, vec![json!("x")]).await.unwrap(), json!("x"));
    }

    #[tokio::test]
    async fn default_undo_succeeds() {
        let ctx = TaskContext::detached("echo");
        assert!(Echo.undo(&ctx, &TaskError::fail("x")).await.is_ok());
    }

    #[test]
    fn downcast_through_trait_object() {
        let task: Box<dyn Task> = Box::new(Echo);
        assert!(task.is::<Echo>());
        assert!(task.downcast_ref::<Bare>().is_none());
    }
}
