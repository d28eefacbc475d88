//! # Per-run lifecycle handle.
//!
//! A [`TaskObserver`] is created by the manager for every `run` call. It is the
//! caller's view of that run: state flags, the settled result, and the
//! cooperative suspend/resume/cancel requests.
//!
//! ## Protocol
//! ```text
//! observer.suspend()   not suspendable ─► Ok(()) (no-op)
//!                      Running         ─► task.suspend(signal) ─► await ack ─► Suspended
//! observer.resume()    Suspended       ─► task.resume(signal)  ─► await ack ─► Running
//! observer.cancel()    not cancelable  ─► Err(NotAllowed)
//!                      Running|Susp.   ─► Cancelling ─► token.cancel()
//!                                         task.cancel(signal) ─► await ack
//! driver settles       Cancelling      ─► Cancelled
//!                      otherwise       ─► Completed | Failed
//! ```
//!
//! Waiting for an acknowledgement also ends when the run settles, so a task
//! that finishes instead of acknowledging never leaves the caller hanging.
//!
//! ## Finalizers
//! [`TaskObserver::finally`] callbacks run one after another once the result
//! settled. [`TaskObserver::result`] only resolves after every callback
//! registered so far has finished.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::observer::state::TaskState;
use crate::tasks::{Signal, SignalWaiter, Task, TaskContext, TaskResult};

type Finalizer = Box<dyn FnOnce(TaskResult) -> BoxFuture<'static, ()> + Send>;

#[derive(Clone)]
struct Snapshot {
    state: TaskState,
    outcome: Option<TaskResult>,
    pending_finalizers: usize,
}

#[derive(Default)]
struct Finalizers {
    queue: VecDeque<Finalizer>,
    draining: bool,
}

pub(crate) struct ObserverInner {
    id: u64,
    task_name: Arc<str>,
    task: Arc<dyn Task>,
    ctx: TaskContext,
    suspendable: bool,
    cancelable: bool,
    snapshot: watch::Sender<Snapshot>,
    finalizers: Mutex<Finalizers>,
    control: tokio::sync::Mutex<()>,
    bus: Bus,
}

/// Handle to one run of a task.
///
/// Cheap to clone; all clones observe the same run.
#[derive(Clone)]
pub struct TaskObserver {
    inner: Arc<ObserverInner>,
}

pub(crate) struct ObserverParams {
    pub id: u64,
    pub task_name: Arc<str>,
    pub task: Arc<dyn Task>,
    pub ctx: TaskContext,
    pub suspendable: bool,
    pub cancelable: bool,
    pub bus: Bus,
}

impl TaskObserver {
    pub(crate) fn new(p: ObserverParams) -> Self {
        let (snapshot, _rx) = watch::channel(Snapshot {
            state: TaskState::Pending,
            outcome: None,
            pending_finalizers: 0,
        });
        Self {
            inner: Arc::new(ObserverInner {
                id: p.id,
                task_name: p.task_name,
                task: p.task,
                ctx: p.ctx,
                suspendable: p.suspendable,
                cancelable: p.cancelable,
                snapshot,
                finalizers: Mutex::new(Finalizers::default()),
                control: tokio::sync::Mutex::new(()),
                bus: p.bus,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ObserverInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<ObserverInner> {
        &self.inner
    }

    /// Run id, unique within the process.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Name the run was started under.
    pub fn task_name(&self) -> &str {
        &self.inner.task_name
    }

    /// The task instance executing this run (shared for singletons).
    pub fn task(&self) -> &Arc<dyn Task> {
        &self.inner.task
    }

    /// Context of the task instance.
    pub fn context(&self) -> &TaskContext {
        &self.inner.ctx
    }

    /// Whether suspend requests reach the task.
    pub fn is_suspendable(&self) -> bool {
        self.inner.suspendable
    }

    /// Whether cancel requests are accepted.
    pub fn is_cancelable(&self) -> bool {
        self.inner.cancelable
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.inner.snapshot.borrow().state
    }

    /// Executing (including while a cancel request is pending).
    pub fn running(&self) -> bool {
        matches!(self.state(), TaskState::Running | TaskState::Cancelling)
    }

    /// Paused by an acknowledged suspend request.
    pub fn suspended(&self) -> bool {
        self.state() == TaskState::Suspended
    }

    /// Settled with a value.
    pub fn completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Settled with an error.
    pub fn failed(&self) -> bool {
        self.state() == TaskState::Failed
    }

    /// Settled after an accepted cancel request.
    pub fn cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// `completed || failed || cancelled`.
    pub fn finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Error the run settled with, if any.
    pub fn error(&self) -> Option<TaskError> {
        match &self.inner.snapshot.borrow().outcome {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Waits for the settled result and for every registered finalizer.
    ///
    /// Can be awaited any number of times, from any number of clones.
    pub async fn result(&self) -> TaskResult {
        let mut rx = self.inner.snapshot.subscribe();
        let outcome = rx
            .wait_for(|s| s.outcome.is_some() && s.pending_finalizers == 0)
            .await
            .ok()
            .and_then(|s| s.outcome.clone());
        outcome.unwrap_or_else(|| Err(TaskError::fail("observer closed before settling")))
    }

    /// Waits until the run settled, without waiting for finalizers.
    pub async fn settled(&self) {
        let mut rx = self.inner.snapshot.subscribe();
        let _ = rx.wait_for(|s| s.outcome.is_some()).await;
    }

    /// Requests suspension.
    ///
    /// A no-op for runs that are not suspendable or not currently running.
    pub async fn suspend(&self) -> Result<(), TaskError> {
        if !self.inner.suspendable {
            return Ok(());
        }
        let _guard = self.inner.control.lock().await;
        if self.state() != TaskState::Running {
            return Ok(());
        }
        let (signal, waiter) = Signal::pair("suspend");
        self.inner.task.suspend(&self.inner.ctx, signal);
        if self.await_ack(waiter).await? {
            self.transition(TaskState::Running, TaskState::Suspended, EventKind::TaskSuspended);
        }
        Ok(())
    }

    /// Requests resumption of a suspended run; a no-op in any other state.
    pub async fn resume(&self) -> Result<(), TaskError> {
        let _guard = self.inner.control.lock().await;
        if self.state() != TaskState::Suspended {
            return Ok(());
        }
        let (signal, waiter) = Signal::pair("resume");
        self.inner.task.resume(&self.inner.ctx, signal);
        if self.await_ack(waiter).await? {
            self.transition(TaskState::Suspended, TaskState::Running, EventKind::TaskResumed);
        }
        Ok(())
    }

    /// Requests cancellation.
    ///
    /// Fails with [`TaskError::NotAllowed`] if the run is not cancelable. Once
    /// accepted, the context's cancellation token fires, the task's `cancel`
    /// hook is called and its acknowledgement awaited. The run still settles
    /// through the task itself; its terminal state becomes `Cancelled`.
    pub async fn cancel(&self) -> Result<(), TaskError> {
        if !self.inner.cancelable {
            return Err(TaskError::not_allowed(format!(
                "task '{}' is not cancelable",
                self.inner.task_name
            )));
        }
        let _guard = self.inner.control.lock().await;
        let mut accepted = false;
        self.inner.snapshot.send_if_modified(|s| {
            if matches!(s.state, TaskState::Running | TaskState::Suspended) {
                s.state = TaskState::Cancelling;
                accepted = true;
            }
            accepted
        });
        if !accepted {
            return Ok(());
        }
        debug!(task = %self.inner.task_name, run = self.inner.id, "cancel accepted");
        self.inner.ctx.cancellation().cancel();
        let (signal, waiter) = Signal::pair("cancel");
        self.inner.task.cancel(&self.inner.ctx, signal);
        self.await_ack(waiter).await.map(|_| ())
    }

    /// Registers a callback run after the result settles.
    ///
    /// Callbacks run strictly one after another, in registration order, and
    /// receive the settled result. `result()` does not resolve while any of
    /// them is pending. Registering on an already settled run schedules the
    /// callback on the tokio runtime.
    pub fn finally<F, Fut>(&self, f: F)
    where
        F: FnOnce(TaskResult) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let finalizer: Finalizer = Box::new(move |res| f(res).boxed());
        let spawn_drain = {
            let mut q = self
                .inner
                .finalizers
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            q.queue.push_back(finalizer);
            self.inner.snapshot.send_modify(|s| s.pending_finalizers += 1);
            let settled = self.inner.snapshot.borrow().outcome.is_some();
            if settled && !q.draining {
                q.draining = true;
                true
            } else {
                false
            }
        };
        if spawn_drain {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { drain_finalizers(&inner).await });
        }
    }

    /// Waits for an acknowledgement or for settlement. `Ok(true)` means acknowledged.
    async fn await_ack(&self, waiter: SignalWaiter) -> Result<bool, TaskError> {
        tokio::select! {
            ack = waiter.wait() => ack.map(|_| true),
            _ = self.settled() => Ok(false),
        }
    }

    fn transition(&self, from: TaskState, to: TaskState, kind: EventKind) {
        let moved = self.inner.snapshot.send_if_modified(|s| {
            if s.state == from {
                s.state = to;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(task = %self.inner.task_name, run = self.inner.id, state = %to, "state changed");
            self.inner.bus.publish(
                Event::now(kind)
                    .with_task(Arc::clone(&self.inner.task_name))
                    .with_run(self.inner.id),
            );
        }
    }

    pub(crate) fn mark_running(&self) {
        self.inner.snapshot.send_if_modified(|s| {
            if s.state == TaskState::Pending {
                s.state = TaskState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Records the terminal outcome; only the first call has an effect.
    ///
    /// Returns the terminal state if this call settled the run.
    pub(crate) fn settle(&self, result: TaskResult) -> Option<TaskState> {
        let mut settled_as = None;
        self.inner.snapshot.send_if_modified(|s| {
            if s.outcome.is_some() {
                return false;
            }
            // a rejection is a failure even after an accepted cancel
            s.state = match (s.state, &result) {
                (_, Err(_)) => TaskState::Failed,
                (TaskState::Cancelling, Ok(_)) => TaskState::Cancelled,
                (_, Ok(_)) => TaskState::Completed,
            };
            s.outcome = Some(result.clone());
            settled_as = Some(s.state);
            true
        });
        settled_as
    }

    /// Runs queued finalizers if nobody else is draining them.
    pub(crate) async fn run_finalizers(&self) {
        let start = {
            let mut q = self
                .inner
                .finalizers
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if q.draining || q.queue.is_empty() {
                false
            } else {
                q.draining = true;
                true
            }
        };
        if start {
            drain_finalizers(&self.inner).await;
        }
    }
}

async fn drain_finalizers(inner: &Arc<ObserverInner>) {
    loop {
        let next = {
            let mut q = inner.finalizers.lock().unwrap_or_else(|e| e.into_inner());
            match q.queue.pop_front() {
                Some(f) => Some(f),
                None => {
                    q.draining = false;
                    None
                }
            }
        };
        let Some(finalizer) = next else { break };

        let outcome = inner
            .snapshot
            .borrow()
            .outcome
            .clone()
            .unwrap_or_else(|| Err(TaskError::fail("finalizer ran before settlement")));
        if let Err(panic) = AssertUnwindSafe(finalizer(outcome)).catch_unwind().await {
            warn!(
                task = %inner.task_name,
                run = inner.id,
                info = %TaskError::from_panic(panic),
                "finalizer panicked"
            );
        }
        inner
            .snapshot
            .send_modify(|s| s.pending_finalizers = s.pending_finalizers.saturating_sub(1));
    }
}

impl fmt::Debug for TaskObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskObserver")
            .field("id", &self.inner.id)
            .field("task_name", &self.inner.task_name)
            .field("state", &self.state())
            .field("suspendable", &self.inner.suspendable)
            .field("cancelable", &self.inner.cancelable)
            .finish()
    }
}
