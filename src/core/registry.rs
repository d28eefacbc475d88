//! # Task registry.
//!
//! Maps names to [`TaskDefinition`]s. A definition is the resolved, immutable
//! registration of one [`TaskClass`]: the merged options, its admission gate
//! and (for singletons) the shared instance.
//!
//! ## Option precedence
//! ```text
//! call-site TaskOptions ─► TaskMeta of the class ─► ManagerConfig / built-in default
//! ```
//!
//! ## Rules
//! - Names are unique; collisions follow the [`LoadPolicy`].
//! - Definitions are handed out as `Arc`s: runs keep theirs even after the name
//!   is deleted or replaced.
//! - The map lives behind a `std` lock that is never held across an await, so
//!   every registry operation is synchronous.
//! - `TaskAdded` / `TaskDeleted` are published on every change.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::core::config::ManagerConfig;
use crate::core::manager::TaskManager;
use crate::core::throttle::Throttle;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{LoadPolicy, Task, TaskClass, TaskContext, TaskOptions};

/// Resolved registration of one task class.
pub struct TaskDefinition {
    name: Arc<str>,
    class: TaskClass,
    tag: Option<String>,
    suspendable: bool,
    cancelable: bool,
    concurrency: usize,
    interval: Option<Duration>,
    singleton: bool,
    description: String,
    throttle: Throttle,
    shared: OnceLock<(Arc<dyn Task>, TaskContext)>,
}

impl TaskDefinition {
    /// Merges call-site options, class metadata and config defaults.
    pub(crate) fn resolve(
        opts: TaskOptions,
        name: Option<String>,
        cfg: &ManagerConfig,
    ) -> Result<Self, TaskError> {
        let TaskOptions {
            class,
            overrides,
            load_policy: _,
        } = opts;
        let meta = class.meta().clone();

        let name = name
            .or(overrides.name)
            .or(meta.name)
            .unwrap_or_else(|| class.name().to_string());
        if name.trim().is_empty() {
            return Err(TaskError::not_valid(format!(
                "invalid task name {name:?} for class '{}'",
                class.name()
            )));
        }

        let suspendable = overrides.suspendable.or(meta.suspendable).unwrap_or(false);
        let cancelable = overrides.cancelable.or(meta.cancelable).unwrap_or(false);
        let singleton = overrides.singleton.or(meta.singleton).unwrap_or(false);
        if singleton && suspendable {
            return Err(TaskError::not_allowed(format!(
                "singleton task '{name}' cannot be suspendable"
            )));
        }
        if singleton && cancelable {
            return Err(TaskError::not_allowed(format!(
                "singleton task '{name}' cannot be cancelable"
            )));
        }

        let concurrency = overrides
            .concurrency
            .or(meta.concurrency)
            .unwrap_or(cfg.default_concurrency);
        let interval = overrides.interval.or(meta.interval);

        Ok(Self {
            name: Arc::from(name),
            tag: overrides.tag.or(meta.tag),
            suspendable,
            cancelable,
            concurrency,
            interval,
            singleton,
            description: overrides.description.or(meta.description).unwrap_or_default(),
            throttle: Throttle::new(concurrency, interval),
            shared: OnceLock::new(),
            class,
        })
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// The registered class.
    pub fn class(&self) -> &TaskClass {
        &self.class
    }

    /// Grouping label.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Whether runs may be suspended.
    pub fn suspendable(&self) -> bool {
        self.suspendable
    }

    /// Whether runs may be cancelled.
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// Concurrency cap as an `Option` (`None` = unbounded).
    pub fn concurrency(&self) -> Option<usize> {
        match self.concurrency {
            0 => None,
            n => Some(n),
        }
    }

    /// Minimum spacing between admissions.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether one instance is shared across runs.
    pub fn singleton(&self) -> bool {
        self.singleton
    }

    /// Human-readable description (may be empty).
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runs currently holding an admission slot, for capped definitions.
    pub fn in_flight(&self) -> Option<usize> {
        self.throttle.in_flight()
    }

    pub(crate) fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Instance for the next run: fresh for regular definitions, the shared
    /// one for singletons. The returned context is bound to `manager`.
    pub(crate) fn instance(
        &self,
        manager: &TaskManager,
    ) -> Result<(Arc<dyn Task>, TaskContext), TaskError> {
        if self.singleton {
            if let Some((task, ctx)) = self.shared.get() {
                return Ok((Arc::clone(task), ctx.clone()));
            }
            let fresh = self.bind(manager)?;
            let (task, ctx) = self.shared.get_or_init(|| fresh);
            return Ok((Arc::clone(task), ctx.clone()));
        }
        self.bind(manager)
    }

    fn bind(&self, manager: &TaskManager) -> Result<(Arc<dyn Task>, TaskContext), TaskError> {
        let task = self.class.instantiate();
        let ctx = TaskContext::new(self.name_arc());
        ctx.set_manager(manager)?;
        ctx.attach_instance(&task);
        Ok((task, ctx))
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("class", &self.class.name())
            .field("tag", &self.tag)
            .field("suspendable", &self.suspendable)
            .field("cancelable", &self.cancelable)
            .field("concurrency", &self.concurrency)
            .field("interval", &self.interval)
            .field("singleton", &self.singleton)
            .finish()
    }
}

/// Name → definition map.
pub(crate) struct Registry {
    defs: RwLock<HashMap<String, Arc<TaskDefinition>>>,
    bus: Bus,
}

impl Registry {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            defs: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Inserts `def` following `policy`. `Ok(false)` means ignored.
    pub(crate) fn insert(
        &self,
        def: TaskDefinition,
        policy: LoadPolicy,
    ) -> Result<bool, TaskError> {
        let name = def.name().to_string();
        {
            let mut defs = self.defs.write().unwrap_or_else(|e| e.into_inner());
            if defs.contains_key(&name) {
                match policy {
                    LoadPolicy::Throw => {
                        return Err(TaskError::AlreadyExists {
                            what: format!("task '{name}'"),
                        });
                    }
                    LoadPolicy::Ignore => {
                        debug!(task = %name, "task already registered, ignored");
                        return Ok(false);
                    }
                    LoadPolicy::Replace => debug!(task = %name, "replacing task definition"),
                }
            }
            defs.insert(name.clone(), Arc::new(def));
        }
        debug!(task = %name, "task added");
        self.bus.publish(Event::now(EventKind::TaskAdded).with_task(name));
        Ok(true)
    }

    pub(crate) fn remove(&self, name: &str) -> Result<Arc<TaskDefinition>, TaskError> {
        let removed = self
            .defs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .ok_or_else(|| TaskError::not_exists(name))?;
        debug!(task = %name, "task deleted");
        self.bus
            .publish(Event::now(EventKind::TaskDeleted).with_task(name));
        Ok(removed)
    }

    pub(crate) fn get(&self, name: &str) -> Result<Arc<TaskDefinition>, TaskError> {
        self.defs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::not_exists(name))
    }

    /// True if `name` is registered and still maps to `def`.
    pub(crate) fn is_current(&self, name: &str, def: &Arc<TaskDefinition>) -> bool {
        self.defs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .is_some_and(|d| Arc::ptr_eq(d, def))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.defs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Sorted names, optionally restricted to one tag.
    pub(crate) fn names(&self, tag: Option<&str>) -> Vec<String> {
        let defs = self.defs.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = defs
            .values()
            .filter(|d| tag.is_none() || d.tag() == tag)
            .map(|d| d.name().to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Definitions carrying `tag`, sorted by name.
    pub(crate) fn by_tag(&self, tag: &str) -> Vec<Arc<TaskDefinition>> {
        let defs = self.defs.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<Arc<TaskDefinition>> = defs
            .values()
            .filter(|d| d.tag() == Some(tag))
            .cloned()
            .collect();
        out.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        out
    }
}
