//! Sliding-window traffic analysis.
//!
//! # Data Flow
//! ```text
//! Server registered
//!     → add_recent_count(key, span) for each window the server needs
//!
//! Backend call completes
//!     → record(key, Success | Failure)
//!     → every window registered for the key is updated
//!
//! Circuit breaker pre/post
//!     → recent_count / recent_failure_count / recent_success_count
//! ```
//!
//! # Design Decisions
//! - Keyed by server id in a DashMap; one key's windows share a shard lock,
//!   so expiry and increment never interleave
//! - Counts for unregistered (key, span) pairs read as zero
//! - Re-registering a window keeps its counters

pub mod window;

use std::time::{Duration, Instant};
use dashmap::DashMap;

pub use window::{Counts, Outcome, Window};

/// Per-key, per-window request counters.
#[derive(Debug)]
pub struct Analysis {
    epoch: Instant,
    keys: DashMap<String, Vec<Window>>,
}

impl Default for Analysis {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            keys: DashMap::new(),
        }
    }

    /// Track a trailing window of `span` for `key`. Idempotent.
    pub fn add_recent_count(&self, key: &str, span: Duration) {
        if span.is_zero() {
            return;
        }

        let mut windows = self.keys.entry(key.to_string()).or_default();
        if windows.iter().all(|w| w.span() != span) {
            windows.push(Window::new(span));
            tracing::debug!(key = %key, span = ?span, "Analysis window registered");
        }
    }

    /// Stop tracking every window of `key`.
    pub fn remove(&self, key: &str) {
        self.keys.remove(key);
    }

    /// Spans currently tracked for `key`.
    pub fn spans(&self, key: &str) -> Vec<Duration> {
        self.keys
            .get(key)
            .map(|windows| windows.iter().map(Window::span).collect())
            .unwrap_or_default()
    }

    /// Record a completed request for `key`.
    pub fn record(&self, key: &str, outcome: Outcome) {
        self.record_at(key, outcome, Instant::now());
    }

    pub(crate) fn record_at(&self, key: &str, outcome: Outcome, now: Instant) {
        let elapsed = now.saturating_duration_since(self.epoch);
        if let Some(mut windows) = self.keys.get_mut(key) {
            for window in windows.iter_mut() {
                window.record(elapsed, outcome);
            }
        }
    }

    /// Counts of the trailing `span` for `key` as of now.
    pub fn recent(&self, key: &str, span: Duration) -> Counts {
        self.recent_at(key, span, Instant::now())
    }

    pub(crate) fn recent_at(&self, key: &str, span: Duration, now: Instant) -> Counts {
        let elapsed = now.saturating_duration_since(self.epoch);
        self.keys
            .get(key)
            .and_then(|windows| {
                windows
                    .iter()
                    .find(|w| w.span() == span)
                    .map(|w| w.counts(elapsed))
            })
            .unwrap_or_default()
    }

    pub fn recent_count(&self, key: &str, span: Duration) -> u64 {
        self.recent(key, span).total
    }

    pub fn recent_success_count(&self, key: &str, span: Duration) -> u64 {
        self.recent(key, span).success
    }

    pub fn recent_failure_count(&self, key: &str, span: Duration) -> u64 {
        self.recent(key, span).failure
    }
}
