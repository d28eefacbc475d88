//! # TaskManager: registry, execution and notifications.
//!
//! The [`TaskManager`] owns everything a group of tasks shares: the
//! definition registry, one admission gate per definition, the notification
//! listener table and the lifecycle event bus.
//!
//! ## Architecture
//! ```text
//! add_task(opts) ──► TaskDefinition::resolve ──► Registry ──► publish TaskAdded
//!
//! run(name, args)
//!   └─► Registry::get(name) ──► runner::start ──► TaskObserver (returned once started)
//!                                     │
//!                                     └─► driver ─► task.run ─► undo? ─► settle
//!
//! ctx.notify(name, data) ──► TaskManager::notify ──► Notifier::dispatch (sync)
//! ```
//!
//! Each manager is independent: no state is shared between managers.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::{Value, json};
//! use tasklane::{Args, Task, TaskClass, TaskContext, TaskManager, TaskOptions, TaskResult};
//!
//! #[derive(Default)]
//! struct Echo;
//!
//! #[async_trait]
//! impl Task for Echo {
//!     async fn main(&self, _ctx: &TaskContext, args: Args) -> TaskResult {
//!         Ok(args.into_iter().next().unwrap_or(Value::Null))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tasklane::TaskError> {
//! let manager = TaskManager::new();
//! manager.add_task(TaskOptions::new(TaskClass::of::<Echo>()).name("a"))?;
//!
//! let observer = manager.run("a", vec![json!("x")]).await?;
//! assert!(observer.completed());
//! assert_eq!(observer.result().await?, json!("x"));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::builder::ManagerBuilder;
use crate::core::config::ManagerConfig;
use crate::core::notify::{Listen, Notification, Notifier, Selector};
use crate::core::registry::{Registry, TaskDefinition};
use crate::core::runner;
use crate::core::source::TaskSource;
use crate::error::TaskError;
use crate::events::{Bus, Event};
use crate::observer::TaskObserver;
use crate::subscribers::SubscriberSet;
use crate::tasks::{
    Args, LoadPolicy, Task, TaskClass, TaskContext, TaskMeta, TaskOptions, TaskResult,
};

static RUN_SEQ: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ManagerInner {
    cfg: ManagerConfig,
    registry: Registry,
    notifier: Notifier,
    bus: Bus,
    _subscribers: Option<Arc<SubscriberSet>>,
    shutdown: CancellationToken,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Registry and runtime of a group of tasks.
///
/// Cheap to clone; clones share the same registry. Task contexts only hold a
/// weak reference, so dropping every handle drops the manager even while
/// singleton instances are alive.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

impl TaskManager {
    /// Manager with the default configuration and no subscribers.
    ///
    /// Does not need a running tokio runtime.
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Manager with `cfg` and no subscribers.
    pub fn with_config(cfg: ManagerConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::from_parts(cfg, bus, None, CancellationToken::new())
    }

    /// Builder for a manager with subscribers.
    pub fn builder(cfg: ManagerConfig) -> ManagerBuilder {
        ManagerBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: ManagerConfig,
        bus: Bus,
        subscribers: Option<Arc<SubscriberSet>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: Registry::new(bus.clone()),
                notifier: Notifier::default(),
                bus,
                _subscribers: subscribers,
                shutdown,
                cfg,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<ManagerInner> {
        &self.inner
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub(crate) fn next_run_id(&self) -> u64 {
        RUN_SEQ.fetch_add(1, AtomicOrdering::Relaxed)
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.cfg
    }

    /// Returns `true` if both handles refer to the same manager.
    pub fn ptr_eq(&self, other: &TaskManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------
    // Registry
    // ---------------------------

    /// Registers a task class.
    ///
    /// The name comes from the options, then the class metadata, then the
    /// class name. On collision the options' load policy (or the configured
    /// default) decides: `Throw` fails with `AlreadyExists`, `Ignore` returns
    /// `Ok(false)`, `Replace` overwrites.
    ///
    /// Fails with `NotAllowed` for a singleton that is also suspendable or
    /// cancelable, and with `NotValid` for an empty name.
    pub fn add_task(&self, opts: impl Into<TaskOptions>) -> Result<bool, TaskError> {
        let opts = opts.into();
        let policy = opts.load_policy.unwrap_or(self.inner.cfg.load_policy);
        let def = TaskDefinition::resolve(opts, None, &self.inner.cfg)?;
        self.inner.registry.insert(def, policy)
    }

    /// Removes a definition. Runs already started are unaffected.
    pub fn delete_task(&self, name: &str) -> Result<(), TaskError> {
        self.inner.registry.remove(name).map(|_| ())
    }

    /// Removes every definition carrying `tag`; returns the removed names.
    pub fn delete_tasks_by_tag(&self, tag: &str) -> Vec<String> {
        self.delete_names(self.inner.registry.names(Some(tag)))
    }

    /// Removes every definition; returns the removed names.
    pub fn delete_all_tasks(&self) -> Vec<String> {
        self.delete_names(self.inner.registry.names(None))
    }

    fn delete_names(&self, names: Vec<String>) -> Vec<String> {
        names
            .into_iter()
            .filter(|name| self.inner.registry.remove(name).is_ok())
            .collect()
    }

    /// Returns `true` if `name` is registered.
    pub fn has_task(&self, name: &str) -> bool {
        self.inner.registry.contains(name)
    }

    /// The definition registered under `name`.
    pub fn get_task(&self, name: &str) -> Result<Arc<TaskDefinition>, TaskError> {
        self.inner.registry.get(name)
    }

    /// The class registered under `name`.
    pub fn get_task_class(&self, name: &str) -> Result<TaskClass, TaskError> {
        Ok(self.inner.registry.get(name)?.class().clone())
    }

    /// An instance of `name` bound to this manager, without running it.
    ///
    /// Regular definitions produce a fresh instance; singletons return the
    /// shared one.
    pub fn get_task_instance(&self, name: &str) -> Result<(Arc<dyn Task>, TaskContext), TaskError> {
        self.inner.registry.get(name)?.instance(self)
    }

    /// Registered names, sorted.
    pub fn get_task_names(&self) -> Vec<String> {
        self.inner.registry.names(None)
    }

    /// Definitions carrying `tag`, sorted by name.
    pub fn get_tasks_by_tag(&self, tag: &str) -> Vec<Arc<TaskDefinition>> {
        self.inner.registry.by_tag(tag)
    }

    /// Registers every class yielded by `source`.
    ///
    /// `defaults` applies to each class as call-site options (its `name` is
    /// ignored, each class resolves its own). Returns the names actually
    /// registered; classes skipped by `LoadPolicy::Ignore` are not listed.
    /// Stops at the first registration error.
    pub fn load_tasks<S>(
        &self,
        source: &S,
        defaults: &TaskMeta,
        policy: Option<LoadPolicy>,
    ) -> Result<Vec<String>, TaskError>
    where
        S: TaskSource + ?Sized,
    {
        let mut loaded = Vec::new();
        for class in source.classes()? {
            let mut overrides = defaults.clone();
            overrides.name = None;
            let mut opts = TaskOptions::from_meta(class, overrides);
            if let Some(policy) = policy {
                opts = opts.load_policy(policy);
            }
            let policy = opts.load_policy.unwrap_or(self.inner.cfg.load_policy);
            let def = TaskDefinition::resolve(opts, None, &self.inner.cfg)?;
            let name = def.name().to_string();
            if self.inner.registry.insert(def, policy)? {
                loaded.push(name);
            }
        }
        debug!(source = source.describe(), count = loaded.len(), "tasks loaded");
        Ok(loaded)
    }

    // ---------------------------
    // Execution
    // ---------------------------

    /// Starts a run of `name` and returns its observer once the task started.
    ///
    /// Waits only for admission. Fails with `NotExists` if `name` is not
    /// registered, including when it is deleted while the run waits for a slot.
    pub async fn run(&self, name: &str, args: Args) -> Result<TaskObserver, TaskError> {
        let def = self.inner.registry.get(name)?;
        runner::start(self, def, args, true).await
    }

    /// Runs an unregistered class once, without touching the registry.
    ///
    /// The run is named after the class key (metadata name, else class name).
    pub async fn run_once(&self, class: TaskClass, args: Args) -> Result<TaskObserver, TaskError> {
        let name = class.key().to_string();
        let def = TaskDefinition::resolve(TaskOptions::new(class), Some(name), &self.inner.cfg)?;
        runner::start(self, Arc::new(def), args, false).await
    }

    /// `run` followed by awaiting the result.
    pub async fn run_and_wait(&self, name: &str, args: Args) -> TaskResult {
        self.run(name, args).await?.result().await
    }

    // ---------------------------
    // Notifications and events
    // ---------------------------

    /// Registers a notification listener.
    ///
    /// Fails with `AlreadyExists` if the same listener `Arc` is already
    /// registered with an identical selector.
    pub fn on_notification<L: Listen>(
        &self,
        selector: impl Into<Selector>,
        listener: Arc<L>,
    ) -> Result<(), TaskError> {
        self.inner.notifier.add(selector.into(), listener)
    }

    /// Registers an already type-erased listener.
    pub fn on_notification_dyn(
        &self,
        selector: impl Into<Selector>,
        listener: Arc<dyn Listen>,
    ) -> Result<(), TaskError> {
        self.inner.notifier.add(selector.into(), listener)
    }

    /// Removes a listener registration; `false` if it was not registered.
    pub fn off_notification<L: Listen>(
        &self,
        selector: impl Into<Selector>,
        listener: &Arc<L>,
    ) -> bool {
        let listener: Arc<dyn Listen> = Arc::clone(listener) as Arc<dyn Listen>;
        self.inner.notifier.remove(&selector.into(), &listener)
    }

    /// Delivers a notification from `sender` to every matching listener.
    ///
    /// Synchronous; returns the number of listeners reached.
    pub fn notify(&self, sender: &TaskContext, name: &str, data: Value) -> usize {
        let n = Notification::new(sender.clone(), name, data);
        self.inner.notifier.dispatch(&n)
    }

    /// Receiver of lifecycle events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.get_task_names())
            .field("listeners", &self.inner.notifier.len())
            .field("config", &self.inner.cfg)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Default)]
    struct Echo;

    #[async_trait]
    impl Task for Echo {
        async fn main(&self, _ctx: &TaskContext, args: Args) -> TaskResult {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn sync_task_is_completed_when_run_returns() {
        let manager = TaskManager::new();
        manager
            .add_task(TaskOptions::new(TaskClass::of::<Echo>()).name("a"))
            .unwrap();
        let obs = manager.run("a", vec![json!("x")]).await.unwrap();
        assert!(obs.completed());
        assert_eq!(obs.result().await.unwrap(), json!("x"));
        assert!(obs.context().manager().unwrap().ptr_eq(&manager));
    }

    #[tokio::test]
    async fn run_unknown_task_fails() {
        let manager = TaskManager::new();
        let err = manager.run("nope", vec![]).await.unwrap_err();
        assert!(matches!(err, TaskError::NotExists { ref name } if name == "nope"));
    }

    #[tokio::test]
    async fn run_once_leaves_registry_untouched() {
        let manager = TaskManager::new();
        let out = manager
            .run_once(TaskClass::of::<Echo>(), vec![json!(5)])
            .await
            .unwrap();
        assert_eq!(out.task_name(), "Echo");
        assert_eq!(out.result().await.unwrap(), json!(5));
        assert!(manager.get_task_names().is_empty());
    }

    #[test]
    fn instance_is_bound_to_manager() {
        let manager = TaskManager::new();
        manager.add_task(TaskClass::of::<Echo>()).unwrap();
        let (task, ctx) = manager.get_task_instance("Echo").unwrap();
        assert!(task.is::<Echo>());
        assert!(ctx.manager().is_some());
        assert!(matches!(
            ctx.set_manager(&manager),
            Err(TaskError::Immutable { property: "manager" })
        ));
    }

    #[test]
    fn load_tasks_applies_defaults_and_policy() {
        let manager = TaskManager::new();
        let classes = vec![
            TaskClass::of::<Echo>(),
            TaskClass::of::<Echo>().named("Other"),
        ];
        let loaded = manager
            .load_tasks(&classes, &TaskMeta::named("ignored").with_tag("bulk"), None)
            .unwrap();
        assert_eq!(loaded, vec!["Echo", "Other"]);
        assert_eq!(manager.get_tasks_by_tag("bulk").len(), 2);

        let again = manager
            .load_tasks(&classes, &TaskMeta::default(), Some(LoadPolicy::Ignore))
            .unwrap();
        assert!(again.is_empty());
    }
}
