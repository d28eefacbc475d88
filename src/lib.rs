//! # tasklane
//!
//! **Tasklane** is an in-process task execution engine for tokio.
//!
//! It registers task classes under names, runs them under per-definition
//! concurrency limits, tracks every run through an observer with a
//! suspend/resume/cancel protocol, and composes tasks into flows (series,
//! parallel, try, waterfall, race).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  TaskClass   │   │  TaskClass   │   │ FlowTask<S>  │
//!     │ (user task)  │   │  (from_fn)   │   │ (composite)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ add_task         ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskManager                                                      │
//! │  - Registry (name → TaskDefinition, load policy)                  │
//! │  - Throttle per definition (FIFO admission, interval)             │
//! │  - Notifier (selector → listeners, synchronous dispatch)          │
//! │  - Bus (broadcast lifecycle events)                               │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼ run              ▼ run              ▼ run_once      │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ TaskObserver │   │ TaskObserver │   │ TaskObserver │   │
//!     │ (run driver) │   │ (run driver) │   │ (run driver) │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ TaskStarting     │ TaskSuspended    │ TaskCancelled   │ TaskAdded
//!      │ TaskCompleted    │ TaskResumed      │ UndoFailed      │ TaskDeleted
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │               (capacity: ManagerConfig::bus_capacity)             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     sub1.on   sub2.on   subN.on
//!                      _event()  _event()  _event()
//! ```
//!
//! ### Run lifecycle
//! ```text
//! run(name, args)
//!   ├─► acquire admission (FIFO; waits while `concurrency` runs are active)
//!   ├─► instance: fresh per run | shared singleton
//!   ├─► observer Pending ─► Running, publish TaskStarting
//!   ├─► task.run(ctx, args)
//!   │       ├─ suspend()  Running ─► Suspended ─► resume() ─► Running
//!   │       └─ cancel()   Running | Suspended ─► Cancelling
//!   ├─► Err? ─► task.undo(err)
//!   ├─► release admission
//!   └─► settle: Completed | Failed | Cancelled ─► finalizers ─► result()
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Tasks**         | Define tasks as types or closures.                       | [`Task`], [`TaskClass`], [`TaskMeta`]       |
//! | **Manager**       | Register, look up and run tasks.                         | [`TaskManager`], [`TaskOptions`]            |
//! | **Observation**   | Follow and control one run.                              | [`TaskObserver`], [`TaskState`]             |
//! | **Flows**         | Compose tasks.                                           | [`FlowTask`], [`Series`], [`Parallel`], ... |
//! | **Notifications** | Task-emitted messages with selector-based listeners.     | [`Selector`], [`Listen`], [`Notification`]  |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).   | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | One typed error for engine and task failures.            | [`TaskError`]                               |
//! | **Configuration** | Centralize manager settings.                             | [`ManagerConfig`]                           |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::json;
//! use tasklane::{Args, Task, TaskClass, TaskContext, TaskManager, TaskMeta, TaskResult};
//!
//! #[derive(Default)]
//! struct Double;
//!
//! #[async_trait]
//! impl Task for Double {
//!     async fn main(&self, _ctx: &TaskContext, args: Args) -> TaskResult {
//!         let n = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
//!         Ok(json!(n * 2))
//!     }
//!
//!     fn meta() -> TaskMeta {
//!         TaskMeta::named("double").with_concurrency(2)
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), tasklane::TaskError> {
//!     let manager = TaskManager::new();
//!     manager.add_task(TaskClass::of::<Double>())?;
//!
//!     let observer = manager.run("double", vec![json!(21)]).await?;
//!     assert_eq!(observer.result().await?, json!(42));
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod flows;
mod observer;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    Listen, ManagerBuilder, ManagerConfig, Notification, Selector, TaskDefinition, TaskManager,
    TaskPredicate, TaskSource,
};
pub use error::{AggregateReport, TaskError};
pub use events::{Bus, Event, EventKind};
pub use flows::{
    FlowEntry, FlowRun, FlowSpec, FlowTask, Parallel, Race, Series, Strategy, SubTask, TaskRef,
    Try, Waterfall, run_flow, run_parallel, run_series,
};
pub use observer::{TaskObserver, TaskState};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    Args, Isomorphic, IsomorphicRef, IsomorphicTask, LoadPolicy, Signal, SignalWaiter, Task,
    TaskClass, TaskContext, TaskMeta, TaskOptions, TaskResult, single_object_arg,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
