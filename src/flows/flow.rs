//! # Composite task over other tasks.
//!
//! [`FlowTask<S>`] is an ordinary [`Task`]: it resolves its [`FlowSpec`],
//! starts sub-runs through the manager bound to its context and hands the
//! composition itself to the [`Strategy`] `S`.
//!
//! ## Cancellation
//! ```text
//! observer.cancel()
//!   ├─► ctx.cancellation() fires ──► FlowRun::watch of each live sub-run
//!   │                                   ├─ cancelable? ─► sub.cancel()
//!   │                                   └─ await sub.result()
//!   ├─► FlowRun::start still queued on a gate ─► admission dropped, never starts
//!   └─► cancel hook stores the Signal
//!
//! strategy returns partial result ──► ack(): signal.done()
//! ```
//! A flow is registered `cancelable` by default; it reports whatever its
//! strategy collected up to the cancellation point.

use std::marker::PhantomData;
use std::mem;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::TaskManager;
use crate::error::TaskError;
use crate::flows::spec::{FlowEntry, FlowSpec, TaskRef};
use crate::observer::TaskObserver;
use crate::tasks::{Args, Signal, Task, TaskClass, TaskContext, TaskMeta, TaskResult};

/// Composition algorithm of a flow.
#[async_trait]
pub trait Strategy: Default + Send + Sync + 'static {
    /// Default registration name of flows using this strategy.
    const NAME: &'static str;

    /// Runs the resolved sub-tasks and produces the flow's result.
    async fn execute(&self, flow: &FlowRun, tasks: Vec<SubTask>) -> TaskResult;
}

/// Built-in task composing other tasks with strategy `S`.
pub struct FlowTask<S: Strategy> {
    preset: Option<FlowSpec>,
    ack: Mutex<CancelAck>,
    _strategy: PhantomData<S>,
}

enum CancelAck {
    Idle,
    Waiting(Signal),
    Acked,
}

impl<S: Strategy> Default for FlowTask<S> {
    fn default() -> Self {
        Self {
            preset: None,
            ack: Mutex::new(CancelAck::Idle),
            _strategy: PhantomData,
        }
    }
}

impl<S: Strategy> FlowTask<S> {
    /// Class reading its spec from the run arguments.
    pub fn class() -> TaskClass {
        TaskClass::of::<Self>()
    }

    /// Class with a fixed spec.
    ///
    /// Run arguments, when given, replace the preset's flow-level arguments.
    pub fn preset(spec: FlowSpec) -> TaskClass {
        TaskClass::with_factory(move || Self {
            preset: Some(spec.clone()),
            ..Self::default()
        })
    }

    fn spec(&self, args: Args) -> Result<FlowSpec, TaskError> {
        match &self.preset {
            Some(preset) if args.is_empty() => Ok(preset.clone()),
            Some(preset) => Ok(preset.clone().with_args(args)),
            None => FlowSpec::from_args(args),
        }
    }

    /// Settles a pending cancel signal, or lets the hook settle it on arrival.
    fn ack_cancel(&self) {
        let mut ack = self.ack.lock().unwrap_or_else(|e| e.into_inner());
        if let CancelAck::Waiting(signal) = mem::replace(&mut *ack, CancelAck::Acked) {
            signal.done();
        }
    }
}

#[async_trait]
impl<S: Strategy> Task for FlowTask<S> {
    async fn main(&self, ctx: &TaskContext, args: Args) -> TaskResult {
        let manager = ctx
            .manager()
            .ok_or_else(|| TaskError::not_allowed("flow task is not bound to a manager"))?;
        let spec = self.spec(args)?;
        let flow = FlowRun {
            manager,
            cancel: ctx.cancellation().clone(),
        };
        let tasks = flow.resolve(spec)?;
        debug!(flow = %ctx.task_name(), strategy = S::NAME, tasks = tasks.len(), "flow starting");

        let out = S::default().execute(&flow, tasks).await;
        if flow.cancelled() {
            self.ack_cancel();
        }
        out
    }

    fn cancel(&self, _ctx: &TaskContext, signal: Signal) {
        let mut ack = self.ack.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*ack, CancelAck::Acked) {
            signal.done();
        } else {
            *ack = CancelAck::Waiting(signal);
        }
    }

    fn meta() -> TaskMeta {
        TaskMeta::named(S::NAME).with_cancelable(true)
    }
}

/// A flow entry whose target has been checked against the registry.
#[derive(Debug, Clone)]
pub struct SubTask {
    target: TaskRef,
    args: Args,
    extra: Option<Args>,
}

impl SubTask {
    /// Result key: task name or class key.
    pub fn key(&self) -> &str {
        self.target.key()
    }

    /// Arguments this entry runs with when nothing is chained into it.
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Per-entry arguments, if the entry had its own.
    pub fn own_args(&self) -> Option<&Args> {
        self.extra.as_ref()
    }
}

/// Handle a strategy uses to start and watch sub-runs.
pub struct FlowRun {
    manager: TaskManager,
    cancel: CancellationToken,
}

impl FlowRun {
    /// Checks every named entry before anything starts.
    fn resolve(&self, spec: FlowSpec) -> Result<Vec<SubTask>, TaskError> {
        let FlowSpec { args, tasks } = spec;
        tasks
            .into_iter()
            .map(|FlowEntry { task, args: own }| -> Result<SubTask, TaskError> {
                if let TaskRef::Name(name) = &task {
                    self.manager.get_task(name)?;
                }
                Ok(SubTask {
                    target: task,
                    args: own.clone().unwrap_or_else(|| args.clone()),
                    extra: own,
                })
            })
            .collect()
    }

    /// Returns `true` once the flow was asked to cancel.
    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Starts one sub-run with the given arguments.
    ///
    /// Admission is raced against the flow's cancellation: `Ok(None)` means
    /// the flow was cancelled before the sub-run got a slot, and it never
    /// starts.
    pub async fn start(
        &self,
        sub: &SubTask,
        args: Args,
    ) -> Result<Option<TaskObserver>, TaskError> {
        let admit = async {
            match &sub.target {
                TaskRef::Name(name) => self.manager.run(name, args).await,
                TaskRef::Class(class) => self.manager.run_once(class.clone(), args).await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(task = %sub.key(), "flow cancelled before sub-task admission");
                Ok(None)
            }
            res = admit => res.map(Some),
        }
    }

    /// Waits for a sub-run, forwarding a flow cancellation to it.
    ///
    /// Non-cancelable sub-runs are left to finish on their own.
    pub async fn watch(&self, obs: &TaskObserver) -> TaskResult {
        tokio::select! {
            biased;
            res = obs.result() => return res,
            _ = self.cancel.cancelled() => {}
        }
        if obs.is_cancelable() {
            if let Err(e) = obs.cancel().await {
                warn!(
                    task = %obs.task_name(),
                    run = obs.id(),
                    error = %e,
                    "sub-task cancel failed"
                );
            }
        }
        obs.result().await
    }

    /// `start` followed by `watch`; `None` if the sub-run was never started.
    pub async fn run(&self, sub: &SubTask, args: Args) -> Option<TaskResult> {
        match self.start(sub, args).await {
            Ok(Some(obs)) => Some(self.watch(&obs).await),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }

    /// Manager the sub-runs go through.
    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }
}

impl std::fmt::Debug for FlowRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRun")
            .field("cancelled", &self.cancelled())
            .finish()
    }
}
