//! Flow tasks: built-in tasks composing other tasks.
//!
//! A flow is registered and run like any other task. Its input is a
//! [`FlowSpec`] (parsed from a single object argument, or preset in code) and
//! its behavior is picked by a [`Strategy`]:
//!
//! ```text
//! FlowTask<S>::main(spec)
//!   ├─► resolve entries (unknown names ─► NotExists, nothing started)
//!   └─► S::execute ─► FlowRun::start / watch ─► manager.run | manager.run_once
//! ```
//!
//! Registering a flow:
//! ```rust
//! use serde_json::json;
//! use tasklane::{FlowTask, Series, TaskClass, TaskManager};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tasklane::TaskError> {
//! let manager = TaskManager::new();
//! manager.add_task(TaskClass::from_fn(|_ctx, args| async move {
//!     Ok(args.into_iter().next().unwrap_or_default())
//! }).named("echo"))?;
//! manager.add_task(FlowTask::<Series>::class())?;
//!
//! let out = manager
//!     .run_and_wait("series", vec![json!({ "args": 1, "tasks": ["echo", { "task": "echo", "args": 2 }] })])
//!     .await?;
//! assert_eq!(out, json!([1, 2]));
//! # Ok(())
//! # }
//! ```

mod flow;
mod run;
mod spec;
mod strategy;

pub use flow::{FlowRun, FlowTask, Strategy, SubTask};
pub use run::{run_flow, run_parallel, run_series};
pub use spec::{FlowEntry, FlowSpec, TaskRef};
pub use strategy::{Parallel, Race, Series, Try, Waterfall};
