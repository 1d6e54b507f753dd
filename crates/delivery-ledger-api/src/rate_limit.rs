//! Fixed-window per-source rate limiting.
//!
//! Vendors burst hard after their own outages, replaying hours of queued
//! callbacks at once. The limiter bounds what a single source can push
//! per window; rejected requests get a 429 with Retry-After, and vendors
//! redeliver later.
//!
//! Windows are keyed by the caller-visible source: the first
//! `x-forwarded-for` hop when present (the service runs behind a proxy),
//! the literal `"direct"` otherwise.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Over the limit; retry after the window rolls over.
    Limited { retry_after_seconds: u64 },
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per source key.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Limiter allowing `limit` requests per source per `window`.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter with a per-minute limit.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Check and count one request from `source`.
    pub fn check(&self, source: &str) -> RateDecision {
        self.check_at(source, Instant::now())
    }

    fn check_at(&self, source: &str, now: Instant) -> RateDecision {
        let mut windows = match self.windows.lock() {
            Ok(windows) => windows,
            // A poisoned limiter fails open: dropping webhooks is worse
            // than briefly not limiting.
            Err(_) => return RateDecision::Allowed,
        };

        // The key space is caller-controlled (any forwarded-for value
        // opens a window), so expired entries are dropped on every check
        // instead of waiting for an external sweep.
        windows.retain(|_, w| now.duration_since(w.started) < self.window);

        let window = windows.entry(source.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if window.count >= self.limit {
            let elapsed = now.duration_since(window.started);
            let remaining = self.window.saturating_sub(elapsed);
            return RateDecision::Limited {
                retry_after_seconds: remaining.as_secs().max(1),
            };
        }

        window.count += 1;
        RateDecision::Allowed
    }

    /// Number of sources currently holding a window.
    pub fn tracked_sources(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
