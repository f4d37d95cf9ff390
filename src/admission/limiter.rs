use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use super::store::{ClientWindowStore, SharedWindow, lock_window};

/// Outcome of one admission check. Always fully populated so the rate-limit
/// headers can be attached to both admitted and rejected responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_epoch_secs: i64,
}

/// Exact sliding-window limiter over a shared [`ClientWindowStore`].
#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<ClientWindowStore>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<ClientWindowStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Admits or denies one request from `identity` against `quota` requests
    /// per window. Requests from the same identity are serialised on that
    /// identity's window lock, so two callers can never both see the last free
    /// slot.
    pub fn check(&self, identity: &str, quota: u32) -> RateDecision {
        loop {
            let shared = self.store.get_or_create(identity);
            if let Some(decision) = self.try_admit(&shared, quota) {
                return decision;
            }
            tracing::debug!("Window for {} was reclaimed mid-check, retrying", identity);
        }
    }

    /// Runs the admission step on an already-fetched window. Returns `None`
    /// when the reclaimer retired that window after it was fetched.
    fn try_admit(&self, shared: &SharedWindow, quota: u32) -> Option<RateDecision> {
        let mut window = lock_window(shared);
        if window.is_retired() {
            return None;
        }

        let now = Instant::now();
        if let Some(cutoff) = now.checked_sub(self.window) {
            window.prune(cutoff);
        }

        let count = window.len();
        if count >= quota as usize {
            let reset_at = window
                .oldest()
                .map_or(now + self.window, |oldest| oldest + self.window);
            return Some(RateDecision {
                admitted: false,
                limit: quota,
                remaining: 0,
                reset_epoch_secs: epoch_secs_at(now, reset_at),
            });
        }

        window.record(now);
        Some(RateDecision {
            admitted: true,
            limit: quota,
            remaining: quota.saturating_sub(window.len() as u32),
            reset_epoch_secs: epoch_secs_at(now, now + self.window),
        })
    }
}

// Monotonic instants have no epoch; anchor on the wall clock and round up.
fn epoch_secs_at(now: Instant, at: Instant) -> i64 {
    let delta = at.saturating_duration_since(now);
    let secs = delta.as_secs() + u64::from(delta.subsec_nanos() > 0);
    Utc::now().timestamp() + secs as i64
}
