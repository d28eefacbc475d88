mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use common::{Ticker, counting, echo, fail_after, ms, value_after};
use tasklane::{
    Args, FlowEntry, FlowSpec, FlowTask, Parallel, Race, Series, TaskClass, TaskError,
    TaskManager, TaskOptions, Try, Waterfall, run_flow, run_parallel, run_series,
};

#[derive(Debug, thiserror::Error)]
#[error("bad input")]
struct BadInput;

/// Class bumping `counter` once it finished sleeping.
fn finishing(counter: Arc<AtomicUsize>, value: Value, delay: Duration) -> TaskClass {
    TaskClass::from_fn(move |_ctx, _args| {
        let counter = Arc::clone(&counter);
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    })
}

fn with_flows() -> TaskManager {
    let manager = TaskManager::new();
    manager.add_task(FlowTask::<Series>::class()).unwrap();
    manager.add_task(FlowTask::<Parallel>::class()).unwrap();
    manager.add_task(FlowTask::<Try>::class()).unwrap();
    manager.add_task(FlowTask::<Waterfall>::class()).unwrap();
    manager.add_task(FlowTask::<Race>::class()).unwrap();
    manager
}

fn add(manager: &TaskManager, name: &str, class: TaskClass) {
    manager.add_task(TaskOptions::new(class).name(name)).unwrap();
}

fn add_ticker(manager: &TaskManager, name: &str) {
    manager
        .add_task(TaskOptions::new(TaskClass::of::<Ticker>()).name(name).cancelable(true))
        .unwrap();
}

#[tokio::test]
async fn flows_register_under_strategy_names() {
    let manager = with_flows();
    assert_eq!(
        manager.get_task_names(),
        vec!["parallel", "race", "series", "try", "waterfall"]
    );
    assert!(manager.get_task("series").unwrap().cancelable());
}

#[tokio::test]
async fn series_passes_flow_args_and_keeps_order() {
    let manager = with_flows();
    add(&manager, "a", echo());
    add(&manager, "b", value_after(json!("b"), ms(20)));

    let out = manager
        .run_and_wait(
            "series",
            vec![json!({ "args": "ateos", "tasks": ["a", "b", { "task": "a", "args": 888 }] })],
        )
        .await
        .unwrap();
    assert_eq!(out, json!(["ateos", "b", 888]));
}

#[tokio::test]
async fn series_stops_at_first_failure() {
    let manager = with_flows();
    let c_runs = Arc::new(AtomicUsize::new(0));
    add(&manager, "a", value_after(json!(1), ms(5)));
    add(
        &manager,
        "b",
        TaskClass::from_fn(|_ctx, _args| async { Err(TaskError::custom(BadInput)) }),
    );
    add(&manager, "c", counting(Arc::clone(&c_runs), json!(3)));

    let err = manager
        .run_and_wait("series", vec![json!({ "tasks": ["a", "b", "c"] })])
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<BadInput>().is_some());
    assert_eq!(c_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn parallel_keys_results_by_task() {
    let manager = with_flows();
    add(&manager, "a", value_after(json!(1), ms(30)));
    add(&manager, "b", value_after(json!(2), ms(10)));

    let out = manager
        .run_and_wait("parallel", vec![json!({ "tasks": ["a", "b"] })])
        .await
        .unwrap();
    assert_eq!(out, json!({ "a": 1, "b": 2 }));
}

#[tokio::test]
async fn parallel_failure_does_not_stop_siblings() {
    let manager = with_flows();
    let done = Arc::new(AtomicUsize::new(0));
    add(&manager, "a", finishing(Arc::clone(&done), json!(666), ms(5)));
    add(&manager, "b", fail_after("b failed", ms(10)));
    add(&manager, "c", finishing(Arc::clone(&done), json!(777), ms(60)));

    let err = manager
        .run_and_wait("parallel", vec![json!({ "tasks": ["a", "b", "c"] })])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "execution failed: b failed");

    tokio::time::sleep(ms(100)).await;
    assert_eq!(done.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn try_returns_first_success_or_aggregate() {
    let manager = with_flows();
    add(&manager, "bad_a", fail_after("a", ms(0)));
    add(&manager, "bad_b", fail_after("b", ms(0)));
    add(&manager, "bad_c", fail_after("c", ms(0)));
    add(&manager, "good", value_after(json!("ok"), ms(5)));

    let err = manager
        .run_and_wait("try", vec![json!({ "tasks": ["bad_a", "bad_b", "bad_c"] })])
        .await
        .unwrap_err();
    let messages: Vec<_> = err.errors().iter().map(ToString::to_string).collect();
    assert!(matches!(err, TaskError::Aggregate { .. }));
    assert_eq!(
        messages,
        vec!["execution failed: a", "execution failed: b", "execution failed: c"]
    );

    let out = manager
        .run_and_wait("try", vec![json!({ "tasks": ["bad_a", "good", "bad_b"] })])
        .await
        .unwrap();
    assert_eq!(out, json!("ok"));
}

#[tokio::test]
async fn waterfall_spreads_results() {
    let manager = with_flows();
    add(
        &manager,
        "d",
        TaskClass::from_fn(|_ctx, args: Args| async move {
            let first = args.first().cloned().unwrap_or(Value::Null);
            Ok(json!([first, 7]))
        }),
    );
    add(
        &manager,
        "e",
        TaskClass::from_fn(|_ctx, args: Args| async move {
            let product: i64 = args.iter().filter_map(Value::as_i64).product();
            Ok(json!(product))
        }),
    );
    add(
        &manager,
        "f",
        TaskClass::from_fn(|_ctx, args: Args| async move {
            Ok(json!(format!("sum = {}", args[0])))
        }),
    );

    let out = manager
        .run_and_wait("waterfall", vec![json!({ "args": 3, "tasks": ["d", "e"] })])
        .await
        .unwrap();
    assert_eq!(out, json!(21));

    let out = manager
        .run_and_wait("waterfall", vec![json!({ "args": 3, "tasks": ["d", "e", "f"] })])
        .await
        .unwrap();
    assert_eq!(out, json!("sum = 21"));
}

#[tokio::test]
async fn waterfall_appends_entry_args() {
    let manager = with_flows();
    add(&manager, "d", value_after(json!([2, 3]), ms(0)));
    add(
        &manager,
        "e",
        TaskClass::from_fn(|_ctx, args: Args| async move { Ok(Value::Array(args)) }),
    );

    let out = manager
        .run_and_wait(
            "waterfall",
            vec![json!({ "tasks": ["d", { "task": "e", "args": [4] }] })],
        )
        .await
        .unwrap();
    assert_eq!(out, json!([2, 3, 4]));
}

#[tokio::test]
async fn race_settles_with_first_and_leaves_losers_running() {
    let manager = with_flows();
    let done = Arc::new(AtomicUsize::new(0));
    add(&manager, "slow", finishing(Arc::clone(&done), json!("slow"), ms(80)));
    add(&manager, "fast", finishing(Arc::clone(&done), json!("fast"), ms(10)));

    let out = manager
        .run_and_wait("race", vec![json!({ "tasks": ["slow", "fast"] })])
        .await
        .unwrap();
    assert_eq!(out, json!("fast"));

    tokio::time::sleep(ms(120)).await;
    assert_eq!(done.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn race_can_be_won_by_a_failure() {
    let manager = with_flows();
    add(&manager, "slow", value_after(json!(1), ms(50)));
    add(&manager, "bad", fail_after("first", ms(5)));

    let err = manager
        .run_and_wait("race", vec![json!({ "tasks": ["slow", "bad"] })])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "execution failed: first");
}

#[tokio::test]
async fn unknown_entry_fails_before_anything_starts() {
    let manager = with_flows();
    let runs = Arc::new(AtomicUsize::new(0));
    add(&manager, "a", counting(Arc::clone(&runs), json!(1)));

    let err = manager
        .run_and_wait("parallel", vec![json!({ "tasks": ["a", "missing"] })])
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::NotExists { ref name } if name == "missing"));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn flow_input_is_validated() {
    let manager = with_flows();
    let err = manager
        .run_and_wait("series", vec![json!({ "tasks": [] }), json!(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::InvalidNumberOfArguments { expected: 1, actual: 2 }));

    let err = manager
        .run_and_wait("series", vec![json!(["a"])])
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::InvalidArgument { .. }));
}

#[tokio::test]
async fn cancel_series_of_cancelable_tasks() {
    let manager = with_flows();
    add_ticker(&manager, "a");
    add_ticker(&manager, "b");

    let observer = manager
        .run("series", vec![json!({ "args": 1000, "tasks": ["a", "b"] })])
        .await
        .unwrap();
    tokio::time::sleep(ms(100)).await;
    observer.cancel().await.unwrap();

    let out = observer.result().await.unwrap();
    let out = out.as_array().unwrap();
    assert_eq!(out.len(), 1);
    assert!(out[0].is_u64());
    assert!(observer.cancelled());
}

#[tokio::test]
async fn cancel_series_waits_for_non_cancelable_task() {
    let manager = with_flows();
    add(&manager, "a", value_after(json!(888), ms(100)));
    add_ticker(&manager, "b");

    let observer = manager
        .run(
            "series",
            vec![json!({ "tasks": ["a", { "task": "b", "args": 1000 }] })],
        )
        .await
        .unwrap();
    tokio::time::sleep(ms(50)).await;
    observer.cancel().await.unwrap();

    // `a` finishes naturally; `b` is never started
    assert_eq!(observer.result().await.unwrap(), json!([888]));
}

#[tokio::test]
async fn cancel_series_after_non_cancelable_finished() {
    let manager = with_flows();
    add(&manager, "a", value_after(json!(888), ms(50)));
    add_ticker(&manager, "b");

    let observer = manager
        .run(
            "series",
            vec![json!({ "tasks": ["a", { "task": "b", "args": 1000 }] })],
        )
        .await
        .unwrap();
    tokio::time::sleep(ms(150)).await;
    observer.cancel().await.unwrap();

    let out = observer.result().await.unwrap();
    assert_eq!(out[0], json!(888));
    assert!(out[1].is_u64());
}

#[tokio::test]
async fn cancel_parallel_collects_partial_results() {
    let manager = with_flows();
    add(&manager, "a", value_after(json!(888), ms(100)));
    add_ticker(&manager, "b");

    let observer = manager
        .run(
            "parallel",
            vec![json!({ "tasks": ["a", { "task": "b", "args": 1000 }] })],
        )
        .await
        .unwrap();
    tokio::time::sleep(ms(50)).await;
    observer.cancel().await.unwrap();

    let out = observer.result().await.unwrap();
    assert_eq!(out["a"], json!(888));
    assert!(out["b"].as_u64().unwrap() < 100);
    assert!(observer.cancelled());
}

/// Concurrency-1 class counting how many runs actually started.
fn single_slot(manager: &TaskManager, name: &str, starts: Arc<AtomicUsize>, delay: Duration) {
    let class = TaskClass::from_fn(move |_ctx, _args| {
        let starts = Arc::clone(&starts);
        async move {
            starts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(json!(1))
        }
    });
    manager
        .add_task(TaskOptions::new(class).name(name).concurrency(1))
        .unwrap();
}

#[tokio::test]
async fn cancel_series_drops_entry_waiting_for_admission() {
    let manager = with_flows();
    let starts = Arc::new(AtomicUsize::new(0));
    single_slot(&manager, "slow", Arc::clone(&starts), ms(400));

    let holder = manager.run("slow", vec![]).await.unwrap();
    let observer = manager
        .run("series", vec![json!({ "tasks": ["slow"] })])
        .await
        .unwrap();
    tokio::time::sleep(ms(20)).await;

    let asked = tokio::time::Instant::now();
    observer.cancel().await.unwrap();
    assert!(asked.elapsed() < ms(200));
    assert_eq!(observer.result().await.unwrap(), json!([]));
    assert!(observer.cancelled());

    assert_eq!(holder.result().await.unwrap(), json!(1));
    tokio::time::sleep(ms(50)).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_parallel_drops_entry_waiting_for_admission() {
    let manager = with_flows();
    let starts = Arc::new(AtomicUsize::new(0));
    single_slot(&manager, "slow", Arc::clone(&starts), ms(300));
    add(&manager, "a", value_after(json!(888), ms(100)));

    let holder = manager.run("slow", vec![]).await.unwrap();
    let observer = manager
        .run("parallel", vec![json!({ "tasks": ["slow", "a"] })])
        .await
        .unwrap();
    tokio::time::sleep(ms(20)).await;
    observer.cancel().await.unwrap();

    assert_eq!(observer.result().await.unwrap(), json!({ "a": 888 }));
    holder.result().await.unwrap();
    tokio::time::sleep(ms(50)).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn nested_flows() {
    let manager = with_flows();
    add(&manager, "x", value_after(json!("x"), ms(5)));
    add(&manager, "y", value_after(json!("y"), ms(5)));

    let out = manager
        .run_and_wait(
            "series",
            vec![json!({ "tasks": [
                { "task": "parallel", "args": { "tasks": ["x", "y"] } },
                "x",
            ] })],
        )
        .await
        .unwrap();
    assert_eq!(out, json!([{ "x": "x", "y": "y" }, "x"]));
}

#[tokio::test]
async fn run_series_with_functions() {
    let manager = TaskManager::new();
    let task1 = TaskClass::from_fn(|_ctx, _args| async {
        tokio::time::sleep(ms(50)).await;
        Ok(json!(777))
    });
    let task2 = TaskClass::from_fn(|_ctx, _args| async { Ok(json!(888)) });

    let observer = run_series(&manager, [task1, task2]).await.unwrap();
    assert_eq!(observer.result().await.unwrap(), json!([777, 888]));
    assert_eq!(observer.task_name(), "series");
    assert!(manager.get_task_names().is_empty());
}

#[tokio::test]
async fn run_parallel_with_functions() {
    let manager = TaskManager::new();
    let task1 = TaskClass::from_fn(|_ctx, _args| async {
        tokio::time::sleep(ms(50)).await;
        Ok(json!(777))
    });
    let task2 = TaskClass::from_fn(|_ctx, _args| async { Ok(json!(888)) });

    let observer = run_parallel(&manager, [task1, task2]).await.unwrap();
    let out = observer.result().await.unwrap();
    let mut values: Vec<_> = out.as_object().unwrap().values().cloned().collect();
    values.sort_by_key(|v| v.as_i64());
    assert_eq!(values, vec![json!(777), json!(888)]);
}

#[tokio::test]
async fn run_flow_mixes_names_and_classes() {
    let manager = TaskManager::new();
    add(&manager, "double", TaskClass::from_fn(|_ctx, args: Args| async move {
        Ok(json!(args[0].as_i64().unwrap_or(0) * 2))
    }));

    let spec = FlowSpec::new(["double"])
        .then(FlowEntry::new(echo().named("echo")).with_args(vec![json!("own")]))
        .with_args(vec![json!(4)]);
    let observer = run_flow::<Parallel>(&manager, spec).await.unwrap();
    assert_eq!(
        observer.result().await.unwrap(),
        json!({ "double": 8, "echo": "own" })
    );
}
