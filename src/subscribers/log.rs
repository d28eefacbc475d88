//! # LogWriter: lifecycle events as log lines
//!
//! A minimal subscriber that renders incoming [`Event`]s through
//! `tracing::info!`. Use it for tests and demos.
//!
//! ## Example output
//! ```text
//! [added] task="fetch"
//! [starting] task="fetch" run=3
//! [failed] task="fetch" run=3 err="connection refused"
//! [undo-failed] task="fetch" run=3 err="rollback refused"
//! [cancelled] task="crawl" run=4
//! ```

use async_trait::async_trait;
use tracing::info;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let run = e.run.unwrap_or_default();
        let err = e.error.as_deref().unwrap_or("");
        match e.kind {
            EventKind::TaskAdded => info!("[added] task={task:?}"),
            EventKind::TaskDeleted => info!("[deleted] task={task:?}"),
            EventKind::TaskStarting => info!("[starting] task={task:?} run={run}"),
            EventKind::TaskCompleted => info!("[completed] task={task:?} run={run}"),
            EventKind::TaskFailed => info!("[failed] task={task:?} run={run} err={err:?}"),
            EventKind::TaskCancelled => info!("[cancelled] task={task:?} run={run}"),
            EventKind::TaskSuspended => info!("[suspended] task={task:?} run={run}"),
            EventKind::TaskResumed => info!("[resumed] task={task:?} run={run}"),
            EventKind::UndoFailed => info!("[undo-failed] task={task:?} run={run} err={err:?}"),
            EventKind::SubscriberOverflow => {
                info!("[subscriber-overflow] subscriber={task:?} reason={err:?}")
            }
            EventKind::SubscriberPanicked => {
                info!("[subscriber-panicked] subscriber={task:?} info={err:?}")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
