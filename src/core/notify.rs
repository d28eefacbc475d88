//! # Task notifications.
//!
//! Running tasks publish ephemeral [`Notification`]s through
//! [`TaskContext::notify`]; the manager delivers each one synchronously to
//! every listener whose [`Selector`] matches.
//!
//! ```text
//! task ── ctx.notify("progress", data) ──► Notifier::dispatch
//!                                            ├─ read lock: collect matching listeners
//!                                            ├─ release lock
//!                                            └─ listener.on_notification(&n)  (in registration order)
//! ```
//!
//! ## Rules
//! - Delivery happens before `notify` returns; listeners never block on the task.
//! - A panicking listener is logged and skipped; the task does not see it.
//! - `(selector, listener)` is the dedup key: registering the same listener
//!   `Arc` with an identical selector twice fails with `AlreadyExists`.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde_json::Value;
use tracing::warn;

use crate::error::TaskError;
use crate::tasks::TaskContext;

static NOTIFICATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Predicate over the emitting task.
pub type TaskPredicate = Arc<dyn Fn(&TaskContext) -> bool + Send + Sync>;

/// Which notifications a listener receives.
#[derive(Clone)]
pub enum Selector {
    /// Every notification.
    Any,
    /// Notifications with this exact name, from any task.
    Name(String),
    /// Notifications from the task registered under `task`, optionally
    /// restricted to one notification name.
    Task {
        /// Notification name filter.
        name: Option<String>,
        /// Registered name of the emitting task.
        task: String,
    },
    /// Like [`Selector::Task`], for any of several tasks.
    Tasks {
        /// Notification name filter.
        name: Option<String>,
        /// Registered names of the emitting tasks.
        tasks: Vec<String>,
    },
    /// Notifications whose emitting task satisfies the predicate.
    Predicate(TaskPredicate),
}

impl Selector {
    /// Selector of notifications named `name` from task `task`.
    pub fn task(name: impl Into<String>, task: impl Into<String>) -> Self {
        Selector::Task {
            name: Some(name.into()),
            task: task.into(),
        }
    }

    /// Selector built from a predicate over the emitting task.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&TaskContext) -> bool + Send + Sync + 'static,
    {
        Selector::Predicate(Arc::new(f))
    }

    fn matches(&self, n: &Notification) -> bool {
        let name_ok = |filter: &Option<String>| filter.as_deref().is_none_or(|f| f == n.name());
        match self {
            Selector::Any => true,
            Selector::Name(name) => name == n.name(),
            Selector::Task { name, task } => name_ok(name) && task == n.task_name(),
            Selector::Tasks { name, tasks } => {
                name_ok(name) && tasks.iter().any(|t| t == n.task_name())
            }
            Selector::Predicate(f) => f(n.task()),
        }
    }

    fn same_as(&self, other: &Selector) -> bool {
        match (self, other) {
            (Selector::Any, Selector::Any) => true,
            (Selector::Name(a), Selector::Name(b)) => a == b,
            (
                Selector::Task { name: an, task: at },
                Selector::Task { name: bn, task: bt },
            ) => an == bn && at == bt,
            (
                Selector::Tasks { name: an, tasks: at },
                Selector::Tasks { name: bn, tasks: bt },
            ) => an == bn && at == bt,
            (Selector::Predicate(a), Selector::Predicate(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => f.write_str("Any"),
            Selector::Name(n) => f.debug_tuple("Name").field(n).finish(),
            Selector::Task { name, task } => f
                .debug_struct("Task")
                .field("name", name)
                .field("task", task)
                .finish(),
            Selector::Tasks { name, tasks } => f
                .debug_struct("Tasks")
                .field("name", name)
                .field("tasks", tasks)
                .finish(),
            Selector::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl<S: Into<String>> From<Option<S>> for Selector {
    fn from(name: Option<S>) -> Self {
        name.map_or(Selector::Any, |n| Selector::Name(n.into()))
    }
}

/// One message emitted by a running task.
#[derive(Clone)]
pub struct Notification {
    /// Monotonic sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    task: TaskContext,
    name: Arc<str>,
    data: Value,
}

impl Notification {
    pub(crate) fn new(task: TaskContext, name: &str, data: Value) -> Self {
        Self {
            seq: NOTIFICATION_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            task,
            name: Arc::from(name),
            data,
        }
    }

    /// Context of the emitting task instance.
    pub fn task(&self) -> &TaskContext {
        &self.task
    }

    /// Registered name of the emitting task.
    pub fn task_name(&self) -> &str {
        self.task.task_name()
    }

    /// Notification name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload.
    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("seq", &self.seq)
            .field("task", &self.task_name())
            .field("name", &self.name)
            .field("data", &self.data)
            .finish()
    }
}

/// Receiver of notifications.
///
/// Implemented for every `Fn(&Notification) + Send + Sync` closure.
pub trait Listen: Send + Sync + 'static {
    /// Called synchronously for each matching notification.
    fn on_notification(&self, n: &Notification);
}

impl<F> Listen for F
where
    F: Fn(&Notification) + Send + Sync + 'static,
{
    fn on_notification(&self, n: &Notification) {
        self(n)
    }
}

struct Entry {
    selector: Selector,
    listener: Arc<dyn Listen>,
}

/// Listener table of one manager.
#[derive(Default)]
pub(crate) struct Notifier {
    entries: RwLock<Vec<Entry>>,
}

impl Notifier {
    pub(crate) fn add(
        &self,
        selector: Selector,
        listener: Arc<dyn Listen>,
    ) -> Result<(), TaskError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries
            .iter()
            .any(|e| same_listener(&e.listener, &listener) && e.selector.same_as(&selector))
        {
            return Err(TaskError::AlreadyExists {
                what: format!("notification listener for {selector:?}"),
            });
        }
        entries.push(Entry { selector, listener });
        Ok(())
    }

    /// Removes a registration; `false` if it was not present.
    pub(crate) fn remove(&self, selector: &Selector, listener: &Arc<dyn Listen>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| !(same_listener(&e.listener, listener) && e.selector.same_as(selector)));
        entries.len() != before
    }

    pub(crate) fn dispatch(&self, n: &Notification) -> usize {
        let targets: Vec<Arc<dyn Listen>> = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .iter()
                .filter(|e| e.selector.matches(n))
                .map(|e| Arc::clone(&e.listener))
                .collect()
        };
        for listener in &targets {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_notification(n))) {
                warn!(
                    task = %n.task_name(),
                    notification = %n.name(),
                    info = %TaskError::from_panic(panic),
                    "notification listener panicked"
                );
            }
        }
        targets.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn same_listener(a: &Arc<dyn Listen>, b: &Arc<dyn Listen>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
