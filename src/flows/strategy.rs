//! # Built-in composition strategies.
//!
//! | strategy    | order      | result                          | on failure                       |
//! |-------------|------------|---------------------------------|----------------------------------|
//! | [`Series`]    | sequential | array, entry order              | stop, fail with that error       |
//! | [`Parallel`]  | concurrent | object keyed by task key        | fail with first error, rest run on |
//! | [`Try`]       | sequential | first success                   | next entry; all failed → `Aggregate` |
//! | [`Waterfall`] | sequential | last entry's result             | stop, fail with that error       |
//! | [`Race`]      | concurrent | first settled run               | first settled run                |
//!
//! No strategy starts an entry once the flow is cancelled, including one
//! still waiting on its admission gate; concurrent ones forward the cancellation to every live
//! cancelable sub-run (see [`FlowRun::watch`]).

use async_trait::async_trait;
use futures::future;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Value};

use crate::error::TaskError;
use crate::flows::flow::{FlowRun, Strategy, SubTask};
use crate::observer::TaskObserver;
use crate::tasks::{Args, TaskResult};

/// Runs entries one after another and collects their results in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Series;

#[async_trait]
impl Strategy for Series {
    const NAME: &'static str = "series";

    async fn execute(&self, flow: &FlowRun, tasks: Vec<SubTask>) -> TaskResult {
        let mut results = Vec::with_capacity(tasks.len());
        for sub in &tasks {
            if flow.cancelled() {
                break;
            }
            match flow.run(sub, sub.args().clone()).await {
                Some(res) => results.push(res?),
                None => break,
            }
        }
        Ok(Value::Array(results))
    }
}

/// Runs all entries at once and collects their results by key.
#[derive(Debug, Default, Clone, Copy)]
pub struct Parallel;

#[async_trait]
impl Strategy for Parallel {
    const NAME: &'static str = "parallel";

    async fn execute(&self, flow: &FlowRun, tasks: Vec<SubTask>) -> TaskResult {
        let observers = start_all(flow, &tasks).await?;
        let mut pending: FuturesUnordered<_> = tasks
            .iter()
            .zip(&observers)
            .filter_map(|(sub, obs)| Some((sub, obs.as_ref()?)))
            .map(|(sub, obs)| async move { (sub.key(), flow.watch(obs).await) })
            .collect();

        let mut results = Map::new();
        while let Some((key, res)) = pending.next().await {
            // siblings keep running after an early return
            results.insert(key.to_string(), res?);
        }
        Ok(Value::Object(results))
    }
}

/// Tries entries in order until one succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct Try;

#[async_trait]
impl Strategy for Try {
    const NAME: &'static str = "try";

    async fn execute(&self, flow: &FlowRun, tasks: Vec<SubTask>) -> TaskResult {
        let mut errors = Vec::new();
        for sub in &tasks {
            if flow.cancelled() {
                break;
            }
            match flow.run(sub, sub.args().clone()).await {
                Some(Ok(value)) => return Ok(value),
                Some(Err(e)) => errors.push(e),
                None => break,
            }
        }
        Err(TaskError::Aggregate { errors })
    }
}

/// Feeds each entry's result into the next one.
///
/// The first entry gets its own or the flow-level arguments. Every later
/// entry gets the previous result spread into positional arguments, followed
/// by its own arguments if it has any.
#[derive(Debug, Default, Clone, Copy)]
pub struct Waterfall;

#[async_trait]
impl Strategy for Waterfall {
    const NAME: &'static str = "waterfall";

    async fn execute(&self, flow: &FlowRun, tasks: Vec<SubTask>) -> TaskResult {
        let mut tasks = tasks.into_iter();
        let Some(first) = tasks.next() else {
            return Ok(Value::Null);
        };
        let Some(res) = flow.run(&first, first.args().clone()).await else {
            return Ok(Value::Null);
        };
        let mut value = res?;
        for sub in tasks {
            if flow.cancelled() {
                break;
            }
            let mut args = spread(value.clone());
            if let Some(own) = sub.own_args() {
                args.extend(own.iter().cloned());
            }
            match flow.run(&sub, args).await {
                Some(res) => value = res?,
                None => break,
            }
        }
        Ok(value)
    }
}

/// Settles with whichever entry settles first.
///
/// Losing runs are not cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct Race;

#[async_trait]
impl Strategy for Race {
    const NAME: &'static str = "race";

    async fn execute(&self, flow: &FlowRun, tasks: Vec<SubTask>) -> TaskResult {
        let observers = start_all(flow, &tasks).await?;
        let started: Vec<_> = observers.iter().flatten().collect();
        if started.is_empty() {
            return Ok(Value::Null);
        }
        let watches = started.into_iter().map(|obs| Box::pin(flow.watch(obs)));
        let (winner, _, _) = future::select_all(watches).await;
        winner
    }
}

/// Starts every entry with its own arguments; all are admitted before any is watched.
///
/// Entries still queued when the flow is cancelled come back as `None`.
async fn start_all(
    flow: &FlowRun,
    tasks: &[SubTask],
) -> Result<Vec<Option<TaskObserver>>, TaskError> {
    future::try_join_all(tasks.iter().map(|sub| flow.start(sub, sub.args().clone()))).await
}

/// Array → its elements; anything else → one argument.
fn spread(value: Value) -> Args {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}
