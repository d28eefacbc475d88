use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    core::{ManagerConfig, TaskManager},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a [`TaskManager`] with lifecycle subscribers.
pub struct ManagerBuilder {
    cfg: ManagerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ManagerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ManagerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets lifecycle-event subscribers.
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the manager.
    ///
    /// With subscribers this spawns their workers and the bus listener, so it
    /// must be called inside a tokio runtime. The listener stops when the last
    /// manager handle is dropped.
    pub fn build(self) -> TaskManager {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let shutdown = CancellationToken::new();
        if self.subscribers.is_empty() {
            return TaskManager::from_parts(self.cfg, bus, None, shutdown);
        }

        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        subscriber_listener(&bus, Arc::clone(&subs), shutdown.clone());
        TaskManager::from_parts(self.cfg, bus, Some(subs), shutdown)
    }
}

/// Forwards bus events to the subscriber set until `shutdown` fires.
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>, shutdown: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    });
}
