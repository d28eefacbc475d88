//! # Start and drive one run.
//!
//! [`start`] admits a run through the definition's gate, binds an instance,
//! creates the [`TaskObserver`] and launches the driver. [`drive`] executes
//! the task and settles the observer.
//!
//! ## Flow
//! ```text
//! start(def, args)
//!   ├─► throttle.acquire()                 (may wait, FIFO)
//!   ├─► same definition still registered?  no ─► Err(NotExists)
//!   ├─► def.instance()                     (fresh | shared singleton)
//!   ├─► TaskObserver::new ─► Running ─► publish TaskStarting
//!   └─► poll driver once inline; still pending ─► tokio::spawn(driver)
//!
//! drive()
//!   ├─► task.run(ctx, args)  (panics caught ─► Panicked)
//!   ├─► Err? ─► task.undo(err)  (undo error ─► warn + UndoFailed, original error kept)
//!   ├─► drop(admission)                    (slot released exactly once)
//!   ├─► observer.settle() ─► publish TaskCompleted | TaskFailed | TaskCancelled
//!   └─► observer.run_finalizers()
//! ```
//!
//! ## Rules
//! - The first poll happens before `start` returns, so a task that never
//!   awaits is already settled when the caller gets its observer.
//! - The admission slot is held across suspension and released only after
//!   `undo` finished, so no other run of the same gate interleaves with it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::core::manager::TaskManager;
use crate::core::registry::TaskDefinition;
use crate::core::throttle::Admission;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::observer::{ObserverParams, TaskObserver, TaskState};
use crate::tasks::{Args, Task, TaskContext};

/// Admits and launches one run of `def`.
///
/// `registered` runs re-check the registry after admission so that a run
/// racing a deletion or a replacement fails with `NotExists`.
pub(crate) async fn start(
    manager: &TaskManager,
    def: Arc<TaskDefinition>,
    args: Args,
    registered: bool,
) -> Result<TaskObserver, TaskError> {
    let admission = def.throttle().acquire().await?;
    if registered && !manager.registry().is_current(def.name(), &def) {
        return Err(TaskError::not_exists(def.name()));
    }

    let (task, ctx) = def.instance(manager)?;
    let bus = manager.bus().clone();
    let obs = TaskObserver::new(ObserverParams {
        id: manager.next_run_id(),
        task_name: def.name_arc(),
        task: Arc::clone(&task),
        ctx: ctx.clone(),
        suspendable: def.suspendable(),
        cancelable: def.cancelable(),
        bus: bus.clone(),
    });
    match ctx.set_observer(&obs) {
        Ok(()) => {}
        // a singleton stays bound to the observer of its first run
        Err(TaskError::Immutable { .. }) if def.singleton() => {}
        Err(e) => return Err(e),
    }

    obs.mark_running();
    debug!(task = %def.name(), run = obs.id(), "run starting");
    bus.publish(
        Event::now(EventKind::TaskStarting)
            .with_task(def.name_arc())
            .with_run(obs.id()),
    );

    let mut driver = Box::pin(drive(obs.clone(), task, ctx, args, admission, bus));
    if futures::poll!(driver.as_mut()).is_pending() {
        tokio::spawn(driver);
    }
    Ok(obs)
}

async fn drive(
    obs: TaskObserver,
    task: Arc<dyn Task>,
    ctx: TaskContext,
    args: Args,
    admission: Admission,
    bus: Bus,
) {
    let outcome = AssertUnwindSafe(task.run(&ctx, args))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)));

    if let Err(err) = &outcome {
        let undone = AssertUnwindSafe(task.undo(&ctx, err))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)));
        if let Err(undo_err) = undone {
            warn!(
                task = %obs.task_name(),
                run = obs.id(),
                error = %err,
                undo_error = %undo_err,
                "undo failed"
            );
            bus.publish(
                Event::now(EventKind::UndoFailed)
                    .with_task(obs.task_name())
                    .with_run(obs.id())
                    .with_error(undo_err.to_string()),
            );
        }
    }
    drop(admission);

    let error = outcome.as_ref().err().map(|e| (e.as_label(), e.to_string()));
    if let Some(state) = obs.settle(outcome) {
        let kind = match state {
            TaskState::Cancelled => EventKind::TaskCancelled,
            TaskState::Failed => EventKind::TaskFailed,
            _ => EventKind::TaskCompleted,
        };
        let mut ev = Event::now(kind).with_task(obs.task_name()).with_run(obs.id());
        match &error {
            Some((label, text)) => {
                debug!(
                    task = %obs.task_name(),
                    run = obs.id(),
                    %state,
                    error = label,
                    "run settled"
                );
                ev = ev.with_error(text.as_str());
            }
            None => debug!(task = %obs.task_name(), run = obs.id(), %state, "run settled"),
        }
        bus.publish(ev);
    }

    obs.run_finalizers().await;
}
