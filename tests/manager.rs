mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use common::{echo, ms, value_after};
use tasklane::{
    Args, EventKind, LoadPolicy, ManagerConfig, Task, TaskClass, TaskContext, TaskError,
    TaskManager, TaskMeta, TaskOptions, TaskResult,
};

#[derive(Default)]
struct Counter {
    runs: AtomicUsize,
}

#[async_trait]
impl Task for Counter {
    async fn main(&self, _ctx: &TaskContext, _args: Args) -> TaskResult {
        Ok(json!(self.runs.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[derive(Default)]
struct Described;

#[async_trait]
impl Task for Described {
    async fn main(&self, _ctx: &TaskContext, _args: Args) -> TaskResult {
        Ok(Value::Null)
    }

    fn meta() -> TaskMeta {
        TaskMeta::named("from-meta")
            .with_tag("meta-tag")
            .with_description("declared")
            .with_concurrency(3)
    }
}

#[tokio::test]
async fn regular_tasks_get_a_fresh_instance_per_run() {
    let manager = TaskManager::new();
    manager
        .add_task(TaskOptions::new(TaskClass::of::<Counter>()).name("c"))
        .unwrap();

    for _ in 0..3 {
        assert_eq!(manager.run_and_wait("c", vec![]).await.unwrap(), json!(1));
    }
}

#[tokio::test]
async fn singleton_shares_one_instance() {
    let manager = TaskManager::new();
    manager
        .add_task(TaskOptions::new(TaskClass::of::<Counter>()).name("c").singleton(true))
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(manager.run_and_wait("c", vec![]).await.unwrap());
    }
    assert_eq!(seen, vec![json!(1), json!(2), json!(3)]);

    let (a, _) = manager.get_task_instance("c").unwrap();
    let (b, _) = manager.get_task_instance("c").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn singleton_rejects_suspendable_and_cancelable() {
    let manager = TaskManager::new();
    let err = manager
        .add_task(TaskOptions::new(echo()).name("s").singleton(true).suspendable(true))
        .unwrap_err();
    assert!(matches!(err, TaskError::NotAllowed { ref reason } if reason.contains("suspendable")));

    let err = manager
        .add_task(TaskOptions::new(echo()).name("c").singleton(true).cancelable(true))
        .unwrap_err();
    assert!(matches!(err, TaskError::NotAllowed { ref reason } if reason.contains("cancelable")));
    assert!(manager.get_task_names().is_empty());
}

#[test]
fn duplicate_names_follow_load_policy() {
    let manager = TaskManager::new();
    manager.add_task(TaskOptions::new(echo()).name("a")).unwrap();

    let err = manager.add_task(TaskOptions::new(echo()).name("a")).unwrap_err();
    assert!(matches!(err, TaskError::AlreadyExists { .. }));

    let ignored = manager
        .add_task(TaskOptions::new(echo()).name("a").load_policy(LoadPolicy::Ignore))
        .unwrap();
    assert!(!ignored);

    let replacement = TaskClass::of::<Counter>();
    let replaced = manager
        .add_task(TaskOptions::new(replacement).name("a").load_policy(LoadPolicy::Replace))
        .unwrap();
    assert!(replaced);
    assert_eq!(manager.get_task_class("a").unwrap().name(), "Counter");
}

#[test]
fn config_load_policy_is_the_default() {
    let manager = TaskManager::with_config(ManagerConfig {
        load_policy: LoadPolicy::Ignore,
        ..ManagerConfig::default()
    });
    assert!(manager.add_task(TaskOptions::new(echo()).name("a")).unwrap());
    assert!(!manager.add_task(TaskOptions::new(echo()).name("a")).unwrap());
}

#[test]
fn call_site_options_override_metadata() {
    let manager = TaskManager::new();
    manager.add_task(TaskClass::of::<Described>()).unwrap();
    let def = manager.get_task("from-meta").unwrap();
    assert_eq!(def.tag(), Some("meta-tag"));
    assert_eq!(def.description(), "declared");
    assert_eq!(def.concurrency(), Some(3));

    manager
        .add_task(
            TaskOptions::new(TaskClass::of::<Described>())
                .name("explicit")
                .tag("call-site")
                .concurrency(1),
        )
        .unwrap();
    let def = manager.get_task("explicit").unwrap();
    assert_eq!(def.tag(), Some("call-site"));
    assert_eq!(def.concurrency(), Some(1));
    assert_eq!(def.description(), "declared");
}

#[test]
fn blank_name_is_not_valid() {
    let manager = TaskManager::new();
    let err = manager.add_task(TaskOptions::new(echo()).name("  ")).unwrap_err();
    assert!(matches!(err, TaskError::NotValid { .. }));
}

#[tokio::test]
async fn unknown_names_fail_with_not_exists() {
    let manager = TaskManager::new();
    assert!(matches!(manager.run("nope", vec![]).await, Err(TaskError::NotExists { .. })));
    assert!(matches!(manager.get_task("nope"), Err(TaskError::NotExists { .. })));
    assert!(matches!(manager.delete_task("nope"), Err(TaskError::NotExists { .. })));
}

#[tokio::test]
async fn deleted_task_cannot_run_but_live_runs_finish() {
    let manager = TaskManager::new();
    manager
        .add_task(TaskOptions::new(value_after(json!(7), ms(50))).name("slow"))
        .unwrap();

    let observer = manager.run("slow", vec![]).await.unwrap();
    manager.delete_task("slow").unwrap();
    assert!(!manager.has_task("slow"));
    assert!(matches!(manager.run("slow", vec![]).await, Err(TaskError::NotExists { .. })));
    assert_eq!(observer.result().await.unwrap(), json!(7));
}

/// Registers `t` with one slot and occupies it for 100ms.
async fn occupied_single_slot(manager: &TaskManager) -> tasklane::TaskObserver {
    manager
        .add_task(
            TaskOptions::new(value_after(json!("old"), ms(100)))
                .name("t")
                .concurrency(1),
        )
        .unwrap();
    manager.run("t", vec![]).await.unwrap()
}

#[tokio::test]
async fn run_waiting_for_a_slot_fails_once_deleted() {
    let manager = TaskManager::new();
    let busy = occupied_single_slot(&manager).await;

    let m = manager.clone();
    let waiting = tokio::spawn(async move { m.run("t", vec![]).await });
    tokio::time::sleep(ms(20)).await;
    manager.delete_task("t").unwrap();

    assert_eq!(busy.result().await.unwrap(), json!("old"));
    let res = waiting.await.unwrap();
    assert!(matches!(res, Err(TaskError::NotExists { ref name }) if name == "t"));
}

#[tokio::test]
async fn run_waiting_for_a_slot_fails_once_replaced() {
    let manager = TaskManager::new();
    let busy = occupied_single_slot(&manager).await;

    let m = manager.clone();
    let waiting = tokio::spawn(async move { m.run("t", vec![]).await });
    tokio::time::sleep(ms(20)).await;
    manager
        .add_task(
            TaskOptions::new(value_after(json!("new"), ms(10)))
                .name("t")
                .load_policy(LoadPolicy::Replace),
        )
        .unwrap();

    assert_eq!(busy.result().await.unwrap(), json!("old"));
    let res = waiting.await.unwrap();
    assert!(matches!(res, Err(TaskError::NotExists { .. })));
    assert_eq!(manager.run_and_wait("t", vec![]).await.unwrap(), json!("new"));
}

#[test]
fn tag_queries_and_bulk_deletion() {
    let manager = TaskManager::new();
    manager.add_task(TaskOptions::new(echo()).name("a").tag("io")).unwrap();
    manager.add_task(TaskOptions::new(echo()).name("b").tag("io")).unwrap();
    manager.add_task(TaskOptions::new(echo()).name("c").tag("cpu")).unwrap();

    let mut io: Vec<_> = manager
        .get_tasks_by_tag("io")
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    io.sort();
    assert_eq!(io, vec!["a", "b"]);

    let mut removed = manager.delete_tasks_by_tag("io");
    removed.sort();
    assert_eq!(removed, vec!["a", "b"]);
    assert_eq!(manager.get_task_names(), vec!["c"]);

    assert_eq!(manager.delete_all_tasks(), vec!["c"]);
    assert!(manager.get_task_names().is_empty());
}

#[tokio::test]
async fn panicking_task_fails_its_run() {
    let manager = TaskManager::new();
    let class = TaskClass::from_fn(|_ctx, args: Args| async move {
        if args.is_empty() {
            panic!("boom");
        }
        Ok(Value::Null)
    });
    manager.add_task(TaskOptions::new(class).name("p")).unwrap();

    let observer = manager.run("p", vec![]).await.unwrap();
    let err = observer.result().await.unwrap_err();
    assert!(matches!(err, TaskError::Panicked { ref message } if message.contains("boom")));
    assert!(observer.failed());
}

#[tokio::test]
async fn lifecycle_events_are_published() {
    let manager = TaskManager::new();
    let mut rx = manager.subscribe();

    manager.add_task(TaskOptions::new(echo()).name("e")).unwrap();
    manager.run_and_wait("e", vec![json!(1)]).await.unwrap();
    manager.delete_task("e").unwrap();

    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        assert!(ev.task.as_deref() == Some("e"));
        kinds.push(ev.kind);
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::TaskAdded,
            EventKind::TaskStarting,
            EventKind::TaskCompleted,
            EventKind::TaskDeleted,
        ]
    );
}

#[test]
fn load_tasks_registers_every_class() {
    let manager = TaskManager::new();
    let classes = vec![
        TaskClass::of::<Counter>(),
        TaskClass::of::<Described>(),
        echo().named("echo"),
    ];
    let mut loaded = manager
        .load_tasks(&classes, &TaskMeta::default().with_tag("bulk"), None)
        .unwrap();
    loaded.sort();
    assert_eq!(loaded, vec!["Counter", "echo", "from-meta"]);
    assert_eq!(manager.get_tasks_by_tag("bulk").len(), 3);

    let again = manager
        .load_tasks(&classes, &TaskMeta::default(), Some(LoadPolicy::Ignore))
        .unwrap();
    assert!(again.is_empty());
}

struct Recorder(Arc<std::sync::Mutex<Vec<EventKind>>>);

#[async_trait]
impl tasklane::Subscribe for Recorder {
    async fn on_event(&self, ev: &tasklane::Event) {
        self.0.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn builder_wires_subscribers() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let manager = TaskManager::builder(ManagerConfig::default())
        .subscriber(Arc::new(Recorder(Arc::clone(&seen))))
        .build();

    manager.add_task(TaskOptions::new(echo()).name("e")).unwrap();
    manager
        .add_task(TaskOptions::new(common::fail_after("x", ms(0))).name("f"))
        .unwrap();
    manager.run_and_wait("e", vec![]).await.unwrap();
    assert!(manager.run_and_wait("f", vec![]).await.is_err());

    tokio::time::sleep(ms(50)).await;
    let seen = seen.lock().unwrap().clone();
    assert!(seen.contains(&EventKind::TaskAdded));
    assert!(seen.contains(&EventKind::TaskCompleted));
    assert!(seen.contains(&EventKind::TaskFailed));
}
