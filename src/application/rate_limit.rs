use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tracing::debug;

/// Sliding-window limiter keyed by caller identity.
///
/// Buckets live only in this process; idle ones are evicted by [`RateLimiter::sweep`].
#[derive(Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn allow(&self, key: &str) -> RateDecision {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> RateDecision {
        let window = self.window;
        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.saturating_duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return RateDecision {
                allowed: false,
                remaining: 0,
            };
        }

        entry.push(now);
        RateDecision {
            allowed: true,
            remaining: remaining - 1,
        }
    }

    /// Drops buckets with no hit inside the window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let window = self.window;
        let before = self.buckets.len();
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.saturating_duration_since(*instant) < window);
            !hits.is_empty()
        });
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(target = "noa::rate_limit", removed, "swept idle rate limit buckets");
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_within_window() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert_eq!(
            limiter.allow_at("user", start),
            RateDecision {
                allowed: true,
                remaining: 1
            }
        );
        assert!(limiter.allow_at("user", start).allowed);
        assert!(!limiter.allow_at("user", start).allowed);
        assert!(limiter.allow_at("other", start).allowed);
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(Duration::from_secs(10), 1);
        let start = Instant::now();
        assert!(limiter.allow_at("user", start).allowed);
        assert!(!limiter.allow_at("user", start + Duration::from_secs(5)).allowed);
        assert!(limiter.allow_at("user", start + Duration::from_secs(11)).allowed);
    }

    #[test]
    fn sweep_evicts_only_idle_buckets() {
        let limiter = RateLimiter::new(Duration::from_secs(10), 5);
        let start = Instant::now();
        limiter.allow_at("idle", start);
        limiter.allow_at("busy", start + Duration::from_secs(8));

        let removed = limiter.sweep_at(start + Duration::from_secs(12));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        let limiter = RateLimiter::new(Duration::from_millis(200), 1);
        assert_eq!(limiter.retry_after_secs(), 1);
    }
}
