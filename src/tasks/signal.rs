//! # Completion signal for the suspend/resume/cancel protocol.
//!
//! The observer creates a [`Signal`] and hands it to the task hook; the task
//! decides when the requested state has actually been reached and calls
//! [`Signal::done`]. Dropping the signal without settling it is reported to
//! the caller as [`TaskError::SignalDropped`](crate::TaskError::SignalDropped).
//!
//! ```text
//! observer.cancel()
//!   ├─► (signal, waiter) = Signal::pair("cancel")
//!   ├─► task.cancel(ctx, signal)      // task stores the signal
//!   └─► waiter.wait().await           // resolves when the task calls signal.done()
//! ```

use tokio::sync::oneshot;

use crate::error::TaskError;

/// Hand-back handle a task settles once it reached a safe state.
#[derive(Debug)]
pub struct Signal {
    action: &'static str,
    tx: oneshot::Sender<()>,
}

impl Signal {
    /// Creates a connected signal/waiter pair for the given protocol step.
    pub fn pair(action: &'static str) -> (Signal, SignalWaiter) {
        let (tx, rx) = oneshot::channel();
        (Signal { action, tx }, SignalWaiter { action, rx })
    }

    /// Protocol step this signal acknowledges (`"suspend"`, `"resume"`, `"cancel"`).
    pub fn action(&self) -> &'static str {
        self.action
    }

    /// Acknowledges the request.
    pub fn done(self) {
        let _ = self.tx.send(());
    }
}

/// Caller side of a [`Signal`].
#[derive(Debug)]
pub struct SignalWaiter {
    action: &'static str,
    rx: oneshot::Receiver<()>,
}

impl SignalWaiter {
    /// Waits until the task settles the signal.
    pub async fn wait(self) -> Result<(), TaskError> {
        self.rx.await.map_err(|_| TaskError::SignalDropped {
            action: self.action,
        })
    }
}
