//! # Example: basic_run
//!
//! Registers a typed task and a closure task, runs them, and watches the
//! lifecycle bus.
//!
//! Shows how to:
//! - Declare registration defaults with [`Task::meta`]
//! - Limit concurrency per definition
//! - Listen to task notifications
//! - Read lifecycle events from [`TaskManager::subscribe`]
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► add_task(Fetch)           (meta: name "fetch", concurrency 2)
//!   ├─► on_notification("progress")
//!   ├─► run("fetch") × 4          (two wait for a slot, FIFO)
//!   └─► await every observer, then drain the event receiver
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example basic_run
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tasklane::{
    Args, Notification, Task, TaskClass, TaskContext, TaskManager, TaskMeta, TaskOptions,
    TaskResult,
};
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Fetch;

#[async_trait]
impl Task for Fetch {
    async fn main(&self, ctx: &TaskContext, args: Args) -> TaskResult {
        let page = args.first().and_then(Value::as_u64).unwrap_or(0);
        for step in 1..=3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            ctx.notify("progress", json!({ "page": page, "step": step }));
        }
        Ok(json!(format!("page {page} fetched")))
    }

    fn meta() -> TaskMeta {
        TaskMeta::named("fetch")
            .with_tag("io")
            .with_concurrency(2)
            .with_description("fetches one page")
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    println!("=== basic_run example ===\n");

    let manager = TaskManager::new();
    let mut events = manager.subscribe();

    manager.add_task(TaskClass::of::<Fetch>())?;
    manager.add_task(
        TaskOptions::new(TaskClass::from_fn(|_ctx, args: Args| async move {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        }))
        .name("sum"),
    )?;

    manager.on_notification(
        "progress",
        Arc::new(|n: &Notification| println!("[{}] progress {}", n.task_name(), n.data())),
    )?;

    let mut observers = Vec::new();
    for page in 0..4 {
        let observer = manager.run("fetch", vec![json!(page)]).await?;
        println!("run #{} admitted", observer.id());
        observers.push(observer);
    }
    for observer in observers {
        println!("run #{} -> {}", observer.id(), observer.result().await?);
    }

    let sum = manager.run_and_wait("sum", vec![json!(1), json!(2), json!(3)]).await?;
    println!("sum -> {sum}");

    println!("\nlifecycle events:");
    while let Ok(ev) = events.try_recv() {
        println!(
            "  #{:<3} {:<16} task={}",
            ev.seq,
            format!("{:?}", ev.kind),
            ev.task.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
