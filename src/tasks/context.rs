//! # Per-instance bindings of a task.
//!
//! Every task instance is paired with a [`TaskContext`] that carries the
//! instance's back-references: the owning manager and the observer of the run
//! that created it. Both are **write-once**: a second assignment fails with
//! [`TaskError::Immutable`]. Regular tasks get a fresh context per run,
//! singleton tasks share one context with their shared instance.
//!
//! The context is also how a running task talks back to the engine:
//! [`TaskContext::notify`] publishes a notification through the manager, and
//! [`TaskContext::cancellation`] is cancelled once a cancel request is accepted.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::{ManagerInner, TaskManager};
use crate::error::TaskError;
use crate::observer::{ObserverInner, TaskObserver};
use crate::tasks::task::Task;

/// Cheap-to-clone handle to an instance's bindings.
#[derive(Clone)]
pub struct TaskContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    task_name: Arc<str>,
    manager: OnceLock<Weak<ManagerInner>>,
    observer: OnceLock<Weak<ObserverInner>>,
    instance: OnceLock<Weak<dyn Task>>,
    cancellation: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(task_name: Arc<str>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                task_name,
                manager: OnceLock::new(),
                observer: OnceLock::new(),
                instance: OnceLock::new(),
                cancellation: CancellationToken::new(),
            }),
        }
    }

    /// Creates a context that is not bound to any manager.
    ///
    /// Useful for driving a task directly in unit tests; notifications sent
    /// through it go nowhere.
    pub fn detached(task_name: impl Into<Arc<str>>) -> Self {
        Self::new(task_name.into())
    }

    /// Registered name of the task this instance was created for.
    pub fn task_name(&self) -> &str {
        &self.inner.task_name
    }

    /// Owning manager, if bound and still alive.
    pub fn manager(&self) -> Option<TaskManager> {
        self.inner
            .manager
            .get()
            .and_then(Weak::upgrade)
            .map(TaskManager::from_inner)
    }

    /// Binds the owning manager. Fails with [`TaskError::Immutable`] if already bound.
    pub fn set_manager(&self, manager: &TaskManager) -> Result<(), TaskError> {
        self.inner
            .manager
            .set(Arc::downgrade(manager.inner()))
            .map_err(|_| TaskError::Immutable {
                property: "manager",
            })
    }

    /// Observer of the run that bound this instance, if still alive.
    pub fn observer(&self) -> Option<TaskObserver> {
        self.inner
            .observer
            .get()
            .and_then(Weak::upgrade)
            .map(TaskObserver::from_inner)
    }

    /// Binds the observer. Fails with [`TaskError::Immutable`] if already bound.
    pub fn set_observer(&self, observer: &TaskObserver) -> Result<(), TaskError> {
        self.inner
            .observer
            .set(Arc::downgrade(observer.inner()))
            .map_err(|_| TaskError::Immutable {
                property: "observer",
            })
    }

    /// Returns `true` once an observer has been bound.
    pub fn has_observer(&self) -> bool {
        self.inner.observer.get().is_some()
    }

    /// The task instance this context belongs to, if still alive.
    pub fn task(&self) -> Option<Arc<dyn Task>> {
        self.inner.instance.get().and_then(Weak::upgrade)
    }

    pub(crate) fn attach_instance(&self, instance: &Arc<dyn Task>) {
        let _ = self.inner.instance.set(Arc::downgrade(instance));
    }

    /// Token cancelled when a cancel request for this instance is accepted.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    /// Publishes a notification through the owning manager.
    ///
    /// Listeners run synchronously inside this call; the task never waits on
    /// anything else. Without a bound manager this is a no-op.
    pub fn notify(&self, name: &str, data: Value) {
        if let Some(manager) = self.manager() {
            manager.notify(self, name, data);
        }
    }

    /// Returns `true` if both handles point at the same instance bindings.
    pub fn ptr_eq(&self, other: &TaskContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_name", &self.inner.task_name)
            .field("bound_manager", &self.inner.manager.get().is_some())
            .field("bound_observer", &self.inner.observer.get().is_some())
            .finish()
    }
}
