//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the registry, the run
//! driver, observers and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: registry (`TaskAdded`/`TaskDeleted`), run driver
//!   (`TaskStarting`, settlements, `UndoFailed`), `TaskObserver`
//!   (`TaskSuspended`/`TaskResumed`), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the manager's subscriber listener (fans out to
//!   `SubscriberSet`) and any receiver from `TaskManager::subscribe`.
//!
//! Lifecycle events are distinct from task *notifications*: notifications are
//! emitted by tasks and delivered synchronously to listeners, events are
//! emitted by the engine and delivered asynchronously.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
