//! # Example: flows
//!
//! Composes registered and ad-hoc tasks with every built-in strategy.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► register: double, inc, slow, fails + all five flow tasks
//!   ├─► series    { args: 5, tasks: [double, inc] }      ─► [10, 6]
//!   ├─► parallel  { args: 5, tasks: [double, slow] }     ─► { double: 10, slow: "slow" }
//!   ├─► try       { tasks: [fails, inc] }                ─► 1
//!   ├─► waterfall { args: 5, tasks: [double, inc] }      ─► 11
//!   ├─► race      { tasks: [slow, inc] }                 ─► 1
//!   └─► run_series(closures)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example flows
//! ```

use std::time::Duration;

use serde_json::{Value, json};
use tasklane::{
    Args, FlowTask, Parallel, Race, Series, TaskClass, TaskError, TaskManager, TaskOptions, Try,
    Waterfall, run_series,
};
use tracing_subscriber::EnvFilter;

fn first_int(args: &Args) -> i64 {
    args.first().and_then(Value::as_i64).unwrap_or(0)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    println!("=== flows example ===\n");

    let manager = TaskManager::new();
    manager.add_task(
        TaskOptions::new(TaskClass::from_fn(|_ctx, args: Args| async move {
            Ok(json!(first_int(&args) * 2))
        }))
        .name("double"),
    )?;
    manager.add_task(
        TaskOptions::new(TaskClass::from_fn(|_ctx, args: Args| async move {
            Ok(json!(first_int(&args) + 1))
        }))
        .name("inc"),
    )?;
    manager.add_task(
        TaskOptions::new(TaskClass::from_fn(|_ctx, _args| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!("slow"))
        }))
        .name("slow"),
    )?;
    manager.add_task(
        TaskOptions::new(TaskClass::from_fn(|_ctx, _args| async {
            Err(TaskError::fail("always fails"))
        }))
        .name("fails"),
    )?;

    manager.add_task(FlowTask::<Series>::class())?;
    manager.add_task(FlowTask::<Parallel>::class())?;
    manager.add_task(FlowTask::<Try>::class())?;
    manager.add_task(FlowTask::<Waterfall>::class())?;
    manager.add_task(FlowTask::<Race>::class())?;

    let runs = [
        ("series", json!({ "args": 5, "tasks": ["double", "inc"] })),
        ("parallel", json!({ "args": 5, "tasks": ["double", "slow"] })),
        ("try", json!({ "tasks": ["fails", "inc"] })),
        ("waterfall", json!({ "args": 5, "tasks": ["double", "inc"] })),
        ("race", json!({ "tasks": ["slow", "inc"] })),
    ];
    for (flow, input) in runs {
        let out = manager.run_and_wait(flow, vec![input]).await?;
        println!("{flow:<10} -> {out}");
    }

    let observer = run_series(
        &manager,
        [
            TaskClass::from_fn(|_ctx, _args| async { Ok(json!(777)) }),
            TaskClass::from_fn(|_ctx, _args| async { Ok(json!(888)) }),
        ],
    )
    .await?;
    println!("run_series -> {}", observer.result().await?);

    let err = manager
        .run_and_wait("try", vec![json!({ "tasks": ["fails", "fails"] })])
        .await
        .unwrap_err();
    println!("try (all fail) -> {}", tasklane::AggregateReport(&err));
    Ok(())
}
