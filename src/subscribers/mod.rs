//! # Lifecycle-event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out that drives subscribers from the manager's [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   run driver ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet::emit
//!                                                                       │
//!                                                       ┌───────────────┼──────────┐
//!                                                       ▼               ▼          ▼
//!                                                   LogWriter        Metrics     Custom
//! ```
//!
//! Subscribers are wired at construction time through
//! [`ManagerBuilder::with_subscribers`](crate::ManagerBuilder::with_subscribers).

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
