//! # Run observation.
//!
//! - [`TaskObserver`] - per-run handle: state flags, result, suspend/resume/cancel, finalizers
//! - [`TaskState`] - lifecycle state machine of one run

mod observer;
mod state;

pub(crate) use observer::{ObserverInner, ObserverParams};

pub use observer::TaskObserver;
pub use state::TaskState;
