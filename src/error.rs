//! Error types used by the task engine and by tasks themselves.
//!
//! [`TaskError`] covers both sides of the boundary:
//! - **engine errors**: registry misuse, admission, protocol violations
//!   (`NotExists`, `AlreadyExists`, `NotAllowed`, `Immutable`, ...);
//! - **task errors**: whatever a task's `main`/`run` fails with
//!   (`Fail`, `Custom`, `Panicked`), propagated verbatim to the observer.
//!
//! The type is `Clone` because one settled result is observed by many callers
//! (every `TaskObserver::result` call, flow aggregation, finalizers).

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// # Errors produced by tasks and by the engine.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// `main` was invoked on a task that never implemented it.
    #[error("task '{task}' does not implement main()")]
    NotImplemented {
        /// Type name of the task.
        task: String,
    },

    /// Operation referenced a task name that is not registered.
    #[error("task '{name}' not exists")]
    NotExists {
        /// The unknown task name.
        name: String,
    },

    /// Duplicate registration (task name or notification listener).
    #[error("{what} already exists")]
    AlreadyExists {
        /// What was duplicated.
        what: String,
    },

    /// Registration input is not a valid task.
    #[error("not valid: {reason}")]
    NotValid {
        /// Why the input was rejected.
        reason: String,
    },

    /// Operation forbidden by the task definition.
    #[error("not allowed: {reason}")]
    NotAllowed {
        /// Why the operation was rejected.
        reason: String,
    },

    /// Write-once binding (`manager` or `observer`) was assigned twice.
    #[error("property '{property}' is immutable")]
    Immutable {
        /// Name of the bound property.
        property: &'static str,
    },

    /// A task received a malformed argument.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: String,
    },

    /// A task received the wrong number of arguments.
    #[error("invalid number of arguments: expected at most {expected}, got {actual}")]
    InvalidNumberOfArguments {
        /// Maximum accepted count.
        expected: usize,
        /// Count actually passed.
        actual: usize,
    },

    /// Every alternative of a try-flow failed.
    #[error("all {} alternatives failed", errors.len())]
    Aggregate {
        /// Individual failures, in execution order.
        errors: Vec<TaskError>,
    },

    /// A suspend/resume/cancel hook dropped its completion signal without settling it.
    #[error("task dropped the {action} signal without acknowledging it")]
    SignalDropped {
        /// Protocol step that was abandoned.
        action: &'static str,
    },

    /// The task panicked while running.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// Task-defined failure carrying only a message.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task-defined failure carrying an arbitrary error value.
    #[error(transparent)]
    Custom(Arc<dyn StdError + Send + Sync + 'static>),
}

impl TaskError {
    /// Shorthand for a message-only task failure.
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Wraps an arbitrary error so that its concrete type survives propagation.
    ///
    /// # Example
    /// ```
    /// use tasklane::TaskError;
    ///
    /// #[derive(Debug)]
    /// struct Disk;
    /// impl std::fmt::Display for Disk {
    ///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("disk") }
    /// }
    /// impl std::error::Error for Disk {}
    ///
    /// let err = TaskError::custom(Disk);
    /// assert!(err.downcast_ref::<Disk>().is_some());
    /// ```
    pub fn custom<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        TaskError::Custom(Arc::new(error))
    }

    /// Returns the wrapped error of a [`TaskError::Custom`] as `E`, if it is one.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            TaskError::Custom(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub(crate) fn not_exists(name: impl Into<String>) -> Self {
        TaskError::NotExists { name: name.into() }
    }

    pub(crate) fn not_allowed(reason: impl Into<String>) -> Self {
        TaskError::NotAllowed {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_valid(reason: impl Into<String>) -> Self {
        TaskError::NotValid {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        TaskError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use tasklane::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::NotImplemented { .. } => "not_implemented",
            TaskError::NotExists { .. } => "not_exists",
            TaskError::AlreadyExists { .. } => "already_exists",
            TaskError::NotValid { .. } => "not_valid",
            TaskError::NotAllowed { .. } => "not_allowed",
            TaskError::Immutable { .. } => "immutable",
            TaskError::InvalidArgument { .. } => "invalid_argument",
            TaskError::InvalidNumberOfArguments { .. } => "invalid_number_of_arguments",
            TaskError::Aggregate { .. } => "aggregate",
            TaskError::SignalDropped { .. } => "signal_dropped",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Custom(_) => "task_error",
        }
    }

    /// Individual failures bundled in an [`TaskError::Aggregate`]; empty otherwise.
    pub fn errors(&self) -> &[TaskError] {
        match self {
            TaskError::Aggregate { errors } => errors,
            _ => &[],
        }
    }

    /// Renders a panic payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque panic payload".to_string()
        };
        TaskError::Panicked { message }
    }
}

/// Lets tasks use `?` on string-ish failures.
impl From<String> for TaskError {
    fn from(error: String) -> Self {
        TaskError::Fail { error }
    }
}

impl From<&str> for TaskError {
    fn from(error: &str) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(error: serde_json::Error) -> Self {
        TaskError::invalid_argument(error.to_string())
    }
}

/// Display adapter listing every error of an aggregate, one per line.
pub struct AggregateReport<'a>(pub &'a TaskError);

impl fmt::Display for AggregateReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.0)?;
        for (i, err) in self.0.errors().iter().enumerate() {
            writeln!(f, "  #{i}: {err}")?;
        }
        Ok(())
    }
}
