//! # Declarative task metadata.
//!
//! [`TaskMeta`] is the static descriptor a task type carries next to its
//! definition (via [`Task::meta`](crate::Task::meta)). The manager reads it at
//! registration time as **defaults**: every field left `None` falls through to
//! the engine default, and every explicit call-site option overrides it.
//!
//! The descriptor is `serde`-deserializable so registration defaults can also
//! come from configuration data:
//!
//! ```
//! use tasklane::TaskMeta;
//!
//! let meta: TaskMeta = serde_json::from_str(
//!     r#"{ "name": "sync", "tag": "io", "concurrency": 4, "interval_ms": 250 }"#,
//! ).unwrap();
//! assert_eq!(meta.name.as_deref(), Some("sync"));
//! assert_eq!(meta.interval, Some(std::time::Duration::from_millis(250)));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Registration defaults attached to a task type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskMeta {
    /// Default registry name.
    pub name: Option<String>,
    /// Grouping label.
    pub tag: Option<String>,
    /// Whether the observer may suspend runs.
    pub suspendable: Option<bool>,
    /// Whether the observer may cancel runs.
    pub cancelable: Option<bool>,
    /// Concurrency cap (`0` = unbounded).
    pub concurrency: Option<usize>,
    /// Minimum spacing between admissions.
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Option<Duration>,
    /// Whether one instance is shared across all runs.
    pub singleton: Option<bool>,
    /// Human-readable description.
    pub description: Option<String>,
}

impl TaskMeta {
    /// Metadata carrying only a name (the short form of a task descriptor).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the default name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the default tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the default `suspendable` flag.
    pub fn with_suspendable(mut self, v: bool) -> Self {
        self.suspendable = Some(v);
        self
    }

    /// Sets the default `cancelable` flag.
    pub fn with_cancelable(mut self, v: bool) -> Self {
        self.cancelable = Some(v);
        self
    }

    /// Sets the default concurrency cap.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = Some(n);
        self
    }

    /// Sets the default admission interval.
    pub fn with_interval(mut self, d: Duration) -> Self {
        self.interval = Some(d);
        self
    }

    /// Sets the default `singleton` flag.
    pub fn with_singleton(mut self, v: bool) -> Self {
        self.singleton = Some(v);
        self
    }

    /// Sets the default description.
    pub fn with_description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&(d.as_millis().min(u128::from(u64::MAX)) as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
