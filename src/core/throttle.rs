//! # Per-definition admission gate.
//!
//! Every task definition owns one [`Throttle`]. A run must hold an
//! [`Admission`] from it before the task instance starts executing.
//!
//! ```text
//! acquire()
//!   ├─► concurrency cap?  sem.acquire_owned()      (FIFO queue, fair semaphore)
//!   ├─► interval?         pacing.lock()            (FIFO mutex)
//!   │                       └─► sleep_until(last + interval); last = now
//!   └─► Admission { permit }
//!
//! drop(Admission) ─► permit returned ─► next queued waiter admitted
//! ```
//!
//! ## Rules
//! - `concurrency = 0` means unbounded (no semaphore created).
//! - A freed slot goes straight to the oldest waiter; no slot is idle while
//!   someone is queued.
//! - `interval` spaces successive admissions independently of the cap.
//! - The slot is held until the [`Admission`] is dropped, which the run driver
//!   does on settlement only (suspension keeps the slot).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, sleep_until};

use crate::error::TaskError;

/// FIFO admission gate with an optional concurrency cap and pacing interval.
pub(crate) struct Throttle {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
    interval: Option<Duration>,
    last_admission: Mutex<Option<Instant>>,
}

/// Proof of admission; releases the slot on drop.
pub(crate) struct Admission {
    _permit: Option<OwnedSemaphorePermit>,
}

impl Throttle {
    pub(crate) fn new(concurrency: usize, interval: Option<Duration>) -> Self {
        let limit = concurrency.min(Semaphore::MAX_PERMITS);
        let semaphore = match limit {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self {
            semaphore,
            limit,
            interval: interval.filter(|d| !d.is_zero()),
            last_admission: Mutex::new(None),
        }
    }

    /// True when neither a cap nor an interval is configured.
    pub(crate) fn is_passthrough(&self) -> bool {
        self.semaphore.is_none() && self.interval.is_none()
    }

    /// Waits for a slot (and for the pacing interval) in FIFO order.
    pub(crate) async fn acquire(&self) -> Result<Admission, TaskError> {
        if self.is_passthrough() {
            return Ok(Admission { _permit: None });
        }
        let permit = match &self.semaphore {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .map_err(|_closed| TaskError::not_allowed("admission gate closed"))?,
            ),
            None => None,
        };

        if let Some(interval) = self.interval {
            let mut last = self.last_admission.lock().await;
            if let Some(prev) = *last {
                sleep_until(prev + interval).await;
            }
            *last = Some(Instant::now());
        }

        Ok(Admission { _permit: permit })
    }

    /// Number of runs currently holding a slot, for capped gates.
    pub(crate) fn in_flight(&self) -> Option<usize> {
        self.semaphore
            .as_ref()
            .map(|sem| self.limit - sem.available_permits())
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("concurrency", &self.limit)
            .field("interval", &self.interval)
            .finish()
    }
}
