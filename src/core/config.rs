//! # Manager configuration.
//!
//! Provides [`ManagerConfig`], the settings shared by every definition a
//! [`TaskManager`](crate::TaskManager) registers.
//!
//! Config is used in two ways:
//! 1. **Manager creation**: `TaskManager::builder(config).build()`
//! 2. **Registration defaults**: options neither the call site nor the task
//!    metadata specify (`concurrency`, `load_policy`)
//!
//! ## Sentinel values
//! - `default_concurrency = 0` → unbounded (no semaphore created)
//! - `bus_capacity = 0` → clamped to 1

use serde::{Deserialize, Serialize};

use crate::tasks::LoadPolicy;

/// Settings of one manager.
///
/// ## Field semantics
/// - `bus_capacity`: lifecycle event ring buffer size (min 1)
/// - `default_concurrency`: concurrency cap applied when nothing else sets one (`0` = unbounded)
/// - `load_policy`: behaviour of `add_task` on name collision when the call site does not choose
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Capacity of the lifecycle bus broadcast channel.
    ///
    /// Receivers lagging behind more than `bus_capacity` events skip the
    /// oldest ones.
    pub bus_capacity: usize,

    /// Concurrency cap for definitions that do not declare one.
    ///
    /// - `0` = unbounded
    /// - `n > 0` = at most `n` runs of one definition execute simultaneously
    pub default_concurrency: usize,

    /// Default collision policy of `add_task`.
    pub load_policy: LoadPolicy,
}

impl ManagerConfig {
    /// Returns the default concurrency cap as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` concurrent runs per definition
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        match self.default_concurrency {
            0 => None,
            n => Some(n),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ManagerConfig {
    /// - `bus_capacity = 1024`
    /// - `default_concurrency = 0` (unbounded)
    /// - `load_policy = LoadPolicy::Throw`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            default_concurrency: 0,
            load_policy: LoadPolicy::Throw,
        }
    }
}
