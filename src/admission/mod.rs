//! In-memory, single-process admission control: per-client sliding windows,
//! the limiter that reads them, and the background reclaimer that bounds
//! their memory.

pub mod limiter;
pub mod reclaimer;
pub mod store;
pub mod window;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;

pub use limiter::{RateDecision, RateLimiter};
pub use reclaimer::Reclaimer;
pub use store::ClientWindowStore;

struct ReclaimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the rate-limit state for one server instance. Built explicitly and
/// handed to the router; the reclaimer runs between `start` and `stop`.
pub struct AdmissionControl {
    store: Arc<ClientWindowStore>,
    limiter: Arc<RateLimiter>,
    idle_grace: Duration,
    sweep_interval: Duration,
    reclaimer: Mutex<Option<ReclaimerHandle>>,
}

impl AdmissionControl {
    pub fn new(config: &RateLimitConfig) -> Self {
        let store = Arc::new(ClientWindowStore::new());
        let limiter = Arc::new(RateLimiter::new(Arc::clone(&store), config.window()));
        Self {
            store,
            limiter,
            idle_grace: config.idle_grace(),
            sweep_interval: config.sweep_interval(),
            reclaimer: Mutex::new(None),
        }
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<ClientWindowStore> {
        &self.store
    }

    /// Spawns the reclaimer. Must be called from within a tokio runtime;
    /// repeated calls are no-ops.
    pub fn start(&self) {
        let mut slot = self.reclaimer.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return;
        }
        let (shutdown, rx) = watch::channel(false);
        let task = Reclaimer::new(Arc::clone(&self.store), self.idle_grace, self.sweep_interval)
            .spawn(rx);
        *slot = Some(ReclaimerHandle { shutdown, task });
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.reclaimer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Signals the reclaimer and waits for it to exit.
    pub async fn stop(&self) {
        let handle = self
            .reclaimer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        let _ = handle.shutdown.send(true);
        if let Err(e) = handle.task.await {
            tracing::warn!("Reclaimer task ended abnormally: {}", e);
        }
    }
}
