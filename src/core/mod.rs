//! Engine core: registry, admission and execution.
//!
//! The public API from this module is [`TaskManager`] (with its
//! [`ManagerBuilder`] and [`ManagerConfig`]), the [`TaskDefinition`] it hands
//! out, the notification types and the [`TaskSource`] bulk-loading seam.
//!
//! Internal modules:
//! - [`registry`]: name → definition map and option resolution;
//! - [`throttle`]: per-definition FIFO admission gate;
//! - [`runner`]: starts a run and drives it to settlement;
//! - [`notify`]: selectors, listeners and synchronous dispatch;
//! - [`manager`]: the public facade tying them together.

mod builder;
mod config;
mod manager;
mod notify;
mod registry;
mod runner;
mod source;
mod throttle;

pub(crate) use manager::ManagerInner;

pub use builder::ManagerBuilder;
pub use config::ManagerConfig;
pub use manager::TaskManager;
pub use notify::{Listen, Notification, Selector, TaskPredicate};
pub use registry::TaskDefinition;
pub use source::TaskSource;
