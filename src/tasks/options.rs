//! # Registration options.
//!
//! [`TaskOptions`] is the call-site configuration passed to
//! [`TaskManager::add_task`](crate::TaskManager::add_task). Every field left
//! unset falls back to the class metadata ([`TaskMeta`]) and then to the
//! engine default:
//!
//! | field         | default                                   |
//! |---------------|-------------------------------------------|
//! | `name`        | metadata name, then class name            |
//! | `suspendable` | `false`                                   |
//! | `cancelable`  | `false`                                   |
//! | `concurrency` | `ManagerConfig::default_concurrency`      |
//! | `interval`    | none                                      |
//! | `singleton`   | `false`                                   |
//! | `description` | empty                                     |
//! | `load_policy` | `ManagerConfig::load_policy`              |
//!
//! ## Example
//! ```rust
//! use tasklane::{LoadPolicy, TaskClass, TaskOptions};
//! # use async_trait::async_trait;
//! # #[derive(Default)] struct Sync;
//! # #[async_trait] impl tasklane::Task for Sync {}
//!
//! let opts = TaskOptions::new(TaskClass::of::<Sync>())
//!     .name("sync")
//!     .tag("io")
//!     .concurrency(2)
//!     .load_policy(LoadPolicy::Replace);
//! assert_eq!(opts.name_hint(), Some("sync"));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tasks::class::TaskClass;
use crate::tasks::meta::TaskMeta;

/// What `add_task` does when the name is already registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Fail with `AlreadyExists`.
    #[default]
    Throw,
    /// Keep the existing definition; `add_task` reports `false`.
    Ignore,
    /// Overwrite the definition. Runs already in flight keep the old one.
    Replace,
}

/// Call-site registration options for one task class.
#[derive(Clone, Debug)]
pub struct TaskOptions {
    pub(crate) class: TaskClass,
    pub(crate) overrides: TaskMeta,
    pub(crate) load_policy: Option<LoadPolicy>,
}

impl TaskOptions {
    /// Options for registering `class` with nothing overridden.
    pub fn new(class: TaskClass) -> Self {
        Self {
            class,
            overrides: TaskMeta::default(),
            load_policy: None,
        }
    }

    /// Options built from configuration data (e.g. a deserialized [`TaskMeta`]).
    pub fn from_meta(class: TaskClass, overrides: TaskMeta) -> Self {
        Self {
            class,
            overrides,
            load_policy: None,
        }
    }

    /// Registry name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.overrides.name = Some(name.into());
        self
    }

    /// Grouping label.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.overrides.tag = Some(tag.into());
        self
    }

    /// Allows the observer to suspend runs.
    pub fn suspendable(mut self, v: bool) -> Self {
        self.overrides.suspendable = Some(v);
        self
    }

    /// Allows the observer to cancel runs.
    pub fn cancelable(mut self, v: bool) -> Self {
        self.overrides.cancelable = Some(v);
        self
    }

    /// Concurrency cap (`0` = unbounded).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.overrides.concurrency = Some(n);
        self
    }

    /// Minimum spacing between admissions.
    pub fn interval(mut self, d: Duration) -> Self {
        self.overrides.interval = Some(d);
        self
    }

    /// Shares one instance across every run.
    pub fn singleton(mut self, v: bool) -> Self {
        self.overrides.singleton = Some(v);
        self
    }

    /// Human-readable description.
    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.overrides.description = Some(d.into());
        self
    }

    /// Behaviour on name collision.
    pub fn load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load_policy = Some(policy);
        self
    }

    /// The class being registered.
    pub fn class(&self) -> &TaskClass {
        &self.class
    }

    /// Name that registration will use, if it can already be resolved.
    pub fn name_hint(&self) -> Option<&str> {
        self.overrides
            .name
            .as_deref()
            .or(self.class.meta().name.as_deref())
    }
}

impl From<TaskClass> for TaskOptions {
    fn from(class: TaskClass) -> Self {
        TaskOptions::new(class)
    }
}
