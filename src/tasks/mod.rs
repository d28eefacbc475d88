//! # Task abstractions.
//!
//! This module provides the task-side types:
//! - [`Task`] - trait for implementing async cooperative tasks
//! - [`TaskClass`] - registrable factory of task instances (typed or function-based)
//! - [`TaskMeta`] - static registration defaults attached to a task type
//! - [`TaskOptions`] - call-site registration options, overriding the metadata
//! - [`TaskContext`] - per-instance manager/observer bindings
//! - [`Signal`] - completion handle of the suspend/resume/cancel protocol
//! - [`Isomorphic`] - adapter for single-object-argument tasks

mod class;
mod context;
mod isomorphic;
mod meta;
mod options;
mod signal;
mod task;

pub(crate) use isomorphic::json_kind;

pub use class::TaskClass;
pub use context::TaskContext;
pub use isomorphic::{Isomorphic, IsomorphicRef, IsomorphicTask, single_object_arg};
pub use meta::TaskMeta;
pub use options::{LoadPolicy, TaskOptions};
pub use signal::{Signal, SignalWaiter};
pub use task::{Args, Task, TaskResult};
