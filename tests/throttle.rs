mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use common::ms;
use tasklane::{Args, ManagerConfig, TaskClass, TaskManager, TaskOptions};

/// Class tracking how many runs overlap; each run sleeps `hold` and records its argument.
fn tracked(
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    order: Arc<Mutex<Vec<Value>>>,
    hold_ms: u64,
) -> TaskClass {
    TaskClass::from_fn(move |_ctx, args: Args| {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        let order = Arc::clone(&order);
        async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            order.lock().unwrap().push(args.first().cloned().unwrap_or(Value::Null));
            tokio::time::sleep(ms(hold_ms)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    })
}

#[tokio::test]
async fn at_most_n_runs_overlap_and_admission_is_fifo() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));
    let manager = TaskManager::new();
    manager
        .add_task(
            TaskOptions::new(tracked(active.clone(), peak.clone(), order.clone(), 30))
                .name("limited")
                .concurrency(2),
        )
        .unwrap();

    // start requests in a fixed order; each `run` returns once admitted
    let mut pending = Vec::new();
    for i in 0..6 {
        let m = manager.clone();
        pending.push(tokio::spawn(async move { m.run("limited", vec![json!(i)]).await }));
        tokio::time::sleep(ms(2)).await;
    }
    for handle in pending {
        let observer = handle.await.unwrap().unwrap();
        observer.result().await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    let order = order.lock().unwrap().clone();
    assert_eq!(order, (0..6).map(|i| json!(i)).collect::<Vec<_>>());
}

#[tokio::test]
async fn in_flight_reflects_admitted_runs() {
    let manager = TaskManager::new();
    let class = TaskClass::from_fn(|_ctx, _args| async {
        tokio::time::sleep(ms(40)).await;
        Ok(Value::Null)
    });
    manager
        .add_task(TaskOptions::new(class).name("a").concurrency(3))
        .unwrap();
    let def = manager.get_task("a").unwrap();
    assert_eq!(def.in_flight(), Some(0));

    let first = manager.run("a", vec![]).await.unwrap();
    let second = manager.run("a", vec![]).await.unwrap();
    assert_eq!(def.in_flight(), Some(2));

    first.result().await.unwrap();
    second.result().await.unwrap();
    assert_eq!(def.in_flight(), Some(0));
}

#[tokio::test]
async fn unbounded_by_default() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));
    let manager = TaskManager::new();
    manager
        .add_task(TaskOptions::new(tracked(active, peak.clone(), order, 20)).name("free"))
        .unwrap();
    assert_eq!(manager.get_task("free").unwrap().concurrency(), None);

    let mut observers = Vec::new();
    for i in 0..5 {
        observers.push(manager.run("free", vec![json!(i)]).await.unwrap());
    }
    for observer in observers {
        observer.result().await.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn config_default_concurrency_applies() {
    let manager = TaskManager::with_config(ManagerConfig {
        default_concurrency: 1,
        ..ManagerConfig::default()
    });
    manager
        .add_task(TaskOptions::new(common::echo()).name("a"))
        .unwrap();
    assert_eq!(manager.get_task("a").unwrap().concurrency(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn interval_spaces_admissions() {
    let manager = TaskManager::new();
    let started = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&started);
    let class = TaskClass::from_fn(move |_ctx, _args| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(tokio::time::Instant::now());
            Ok(Value::Null)
        }
    });
    manager
        .add_task(TaskOptions::new(class).name("spaced").interval(ms(100)))
        .unwrap();

    for _ in 0..3 {
        manager.run_and_wait("spaced", vec![]).await.unwrap();
    }

    let started = started.lock().unwrap().clone();
    assert_eq!(started.len(), 3);
    for pair in started.windows(2) {
        assert!(pair[1] - pair[0] >= ms(100));
    }
}
