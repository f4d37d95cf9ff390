use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::store::ClientWindowStore;

/// Periodically evicts clients with no admitted request inside the grace
/// period, so the store does not grow with every address ever seen.
#[derive(Debug, Clone)]
pub struct Reclaimer {
    store: Arc<ClientWindowStore>,
    idle_grace: Duration,
    interval: Duration,
}

impl Reclaimer {
    pub fn new(store: Arc<ClientWindowStore>, idle_grace: Duration, interval: Duration) -> Self {
        Self {
            store,
            idle_grace,
            interval,
        }
    }

    /// One pass: collect idle identities, then remove them once iteration is
    /// over. Removal re-checks idleness, so a client that sent a request in
    /// between keeps its window.
    pub fn sweep(&self) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(self.idle_grace) else {
            return 0;
        };

        let mut idle = Vec::new();
        self.store.for_each(|identity, window| {
            if window.is_idle_since(cutoff) {
                idle.push(identity.to_string());
            }
        });

        idle.iter()
            .filter(|identity| {
                self.store
                    .remove_if(identity, |window| window.is_idle_since(cutoff))
            })
            .count()
    }

    /// Runs [`Reclaimer::sweep`] every interval until `shutdown` flips to true
    /// or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        // First sweep is one full interval after spawn, not after first poll.
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::spawn(async move {
            tracing::info!(
                "Rate-limit reclaimer started (interval: {:?}, idle grace: {:?})",
                self.interval,
                self.idle_grace
            );

            loop {
                tokio::select! {
                    biased;
                    _ = ticker.tick() => {
                        let evicted = self.sweep();
                        if evicted > 0 {
                            tracing::info!(
                                "Reclaimed {} idle rate-limit clients ({} remaining)",
                                evicted,
                                self.store.len()
                            );
                        } else {
                            tracing::debug!("Reclaim sweep found no idle clients");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Rate-limit reclaimer stopped");
        })
    }
}
