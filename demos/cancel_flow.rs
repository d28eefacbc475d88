//! # Example: cancel_flow
//!
//! Cancels a running series flow and prints the partial result. Lifecycle
//! events are rendered by the built-in [`LogWriter`] subscriber.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► builder(cfg).with_subscribers([LogWriter]).build()
//!   ├─► register: step (non-cancelable, 300ms), crawl (cancelable loop), series
//!   ├─► run series { tasks: [step, crawl] }
//!   ├─► sleep 600ms            (step done, crawl ticking)
//!   ├─► observer.cancel()
//!   │     ├─► flow token fires ─► crawl.cancel() ─► crawl returns its page count
//!   │     └─► flow acknowledges once the partial result is collected
//!   └─► result: [ "step done", <pages> ]
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example cancel_flow --features logging
//! ```

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tasklane::{
    Args, FlowTask, LogWriter, ManagerConfig, Series, Signal, Subscribe, Task, TaskClass,
    TaskContext, TaskManager, TaskOptions, TaskResult,
};
use tracing_subscriber::EnvFilter;

/// Crawls pages until cancelled.
#[derive(Default)]
struct Crawl {
    pages: AtomicU64,
    cancel: Mutex<Option<Signal>>,
}

#[async_trait]
impl Task for Crawl {
    async fn main(&self, ctx: &TaskContext, _args: Args) -> TaskResult {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    let n = self.pages.fetch_add(1, Ordering::SeqCst) + 1;
                    println!("[crawl] page {n}");
                }
                _ = ctx.cancellation().cancelled() => break,
            }
        }
        if let Some(signal) = self.cancel.lock().ok().and_then(|mut s| s.take()) {
            signal.done();
        }
        Ok(json!(self.pages.load(Ordering::SeqCst)))
    }

    fn cancel(&self, _ctx: &TaskContext, signal: Signal) {
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = Some(signal);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    println!("=== cancel_flow example ===\n");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let manager = TaskManager::builder(ManagerConfig::default())
        .with_subscribers(subs)
        .build();

    manager.add_task(
        TaskOptions::new(TaskClass::from_fn(|_ctx, _args| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(json!("step done"))
        }))
        .name("step"),
    )?;
    manager.add_task(
        TaskOptions::new(TaskClass::of::<Crawl>())
            .name("crawl")
            .cancelable(true),
    )?;
    manager.add_task(FlowTask::<Series>::class())?;

    let observer = manager
        .run("series", vec![json!({ "tasks": ["step", "crawl"] })])
        .await?;
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("cancelling flow (state: {})", observer.state());
    observer.cancel().await?;
    println!("partial result -> {}", observer.result().await?);
    println!("final state    -> {}", observer.state());

    // let the subscriber worker flush the last events
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
