use std::collections::VecDeque;

use tokio::time::Instant;

/// Admitted-request timestamps for one client, oldest first.
#[derive(Debug, Default)]
pub struct ClientWindow {
    timestamps: VecDeque<Instant>,
    retired: bool,
}

impl ClientWindow {
    /// Drops every timestamp at or before `cutoff`. Timestamps are appended in
    /// increasing order, so this only ever trims a prefix.
    pub fn prune(&mut self, cutoff: Instant) -> usize {
        let mut dropped = 0;
        while self.timestamps.front().is_some_and(|&t| t <= cutoff) {
            self.timestamps.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn record(&mut self, at: Instant) {
        self.timestamps.push_back(at);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn oldest(&self) -> Option<Instant> {
        self.timestamps.front().copied()
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }

    /// Marks the window as removed from its store. Callers holding a stale
    /// handle must fetch the current window instead of recording here.
    pub fn retire(&mut self) {
        self.retired = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// True when nothing was admitted after `cutoff`.
    pub fn is_idle_since(&self, cutoff: Instant) -> bool {
        self.last_seen().is_none_or(|t| t <= cutoff)
    }
}
