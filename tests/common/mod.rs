#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use tasklane::{Args, Signal, Task, TaskClass, TaskContext, TaskError, TaskResult};

/// Installs a test log sink once; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Cooperative task ticking every 10ms until `args[0]` milliseconds elapsed
/// (default 1000). Resolves with the tick count, also when cancelled.
#[derive(Default)]
pub struct Ticker {
    ticks: AtomicU64,
    suspend: Mutex<Option<Signal>>,
    resume: Mutex<Option<Signal>>,
    cancel: Mutex<Option<Signal>>,
    wake: Notify,
}

impl Ticker {
    fn take(slot: &Mutex<Option<Signal>>) -> Option<Signal> {
        slot.lock().unwrap().take()
    }
}

#[async_trait]
impl Task for Ticker {
    async fn run(&self, ctx: &TaskContext, args: Args) -> TaskResult {
        let max_ms = args.first().and_then(Value::as_u64).unwrap_or(1000);
        let max_ticks = (max_ms / 10).max(1);
        self.ticks.store(0, Ordering::SeqCst);
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let ticks = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if ticks >= max_ticks {
                return Ok(json!(ticks));
            }
            if let Some(signal) = Self::take(&self.suspend) {
                signal.done();
                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = ctx.cancellation().cancelled() => {}
                }
                if let Some(signal) = Self::take(&self.resume) {
                    signal.done();
                }
            }
            if let Some(signal) = Self::take(&self.cancel) {
                signal.done();
                return Ok(json!(self.ticks.load(Ordering::SeqCst)));
            }
        }
    }

    fn suspend(&self, _ctx: &TaskContext, signal: Signal) {
        *self.suspend.lock().unwrap() = Some(signal);
    }

    fn resume(&self, _ctx: &TaskContext, signal: Signal) {
        *self.resume.lock().unwrap() = Some(signal);
        self.wake.notify_one();
    }

    fn cancel(&self, _ctx: &TaskContext, signal: Signal) {
        *self.cancel.lock().unwrap() = Some(signal);
    }
}

/// Class returning `value` after `delay`.
pub fn value_after(value: Value, delay: Duration) -> TaskClass {
    TaskClass::from_fn(move |_ctx, _args| {
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    })
}

/// Class failing with `msg` after `delay`.
pub fn fail_after(msg: &'static str, delay: Duration) -> TaskClass {
    TaskClass::from_fn(move |_ctx, _args| async move {
        tokio::time::sleep(delay).await;
        Err(TaskError::fail(msg))
    })
}

/// Class echoing its first argument.
pub fn echo() -> TaskClass {
    TaskClass::from_fn(|_ctx, args: Args| async move {
        Ok(args.into_iter().next().unwrap_or(Value::Null))
    })
}

/// Class bumping `counter` and returning `value`.
pub fn counting(counter: Arc<AtomicUsize>, value: Value) -> TaskClass {
    TaskClass::from_fn(move |_ctx, _args| {
        let counter = Arc::clone(&counter);
        let value = value.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    })
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
