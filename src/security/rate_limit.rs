//! Sliding-window rate limiting for auth flows.
//!
//! Each key owns an ordered list of admitted-request timestamps inside the
//! trailing window; entries are pruned lazily on every check, there is no
//! background sweep. State is process-local: a multi-instance deployment
//! must move these counters to a shared atomically-updated store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// When the oldest surviving request leaves the window.
    pub reset_at: Instant,
}

impl RateDecision {
    /// How long the caller should wait before retrying.
    #[must_use]
    pub fn retry_after(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }
}

/// Per-key request counters over a trailing time window.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    window: Duration,
    max_requests: usize,
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowRateLimiter {
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record a request for `key`.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Check with an explicit clock, so tests can drive time.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let requests = windows.entry(key.to_string()).or_default();

        // Lazy pruning: drop everything older than the window start.
        if let Some(window_start) = now.checked_sub(self.window) {
            requests.retain(|stamp| *stamp > window_start);
        }

        let allowed = requests.len() < self.max_requests;
        if allowed {
            requests.push(now);
        }

        let oldest = requests.first().copied().unwrap_or(now);
        RateDecision {
            allowed,
            remaining: u32::try_from(self.max_requests.saturating_sub(requests.len()))
                .unwrap_or(u32::MAX),
            reset_at: oldest + self.window,
        }
    }

    /// Forget all requests recorded for `key`.
    pub fn reset(&self, key: &str) {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        windows.remove(key);
    }
}
