use std::fmt;

/// Lifecycle state of one run.
///
/// ```text
/// Pending ──► Running ──► Completed | Failed
///               │  ▲
///       suspend │  │ resume           (suspendable only)
///               ▼  │
///             Suspended
///
/// Running | Suspended ──cancel──► Cancelling ──Ok──► Cancelled   (cancelable only)
///                                        └──────Err──► Failed
/// ```
///
/// `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Observer created, task not yet started.
    Pending,
    /// Task is executing.
    Running,
    /// Task acknowledged a suspend request.
    Suspended,
    /// A cancel request was accepted; the task has not settled yet.
    Cancelling,
    /// Settled with a value.
    Completed,
    /// Settled with an error.
    Failed,
    /// Settled after an accepted cancel request.
    Cancelled,
}

impl TaskState {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Stable lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Suspended => "suspended",
            TaskState::Cancelling => "cancelling",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
