//! Edge cache tuning, loaded from the `[cache]` settings section.

use std::time::Duration;

const DEFAULT_KEY: &str = "home-feed:v1";
const DEFAULT_TTL_SECS: u64 = 45;
const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 10;
const DEFAULT_REFRESH_CONCURRENCY: usize = 4;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCacheConfig {
    /// Backend key holding the cached envelope.
    pub key: String,
    /// Logical freshness window recorded as `expiresAt`.
    pub ttl: Duration,
    /// A hit closer than this to expiry schedules a background refresh.
    pub refresh_threshold: Duration,
    /// How long the backend keeps the envelope; outlives `ttl` so stale values stay servable.
    pub retention: Duration,
    /// Concurrent background refreshes allowed.
    pub refresh_concurrency: usize,
    /// Upper bound on a single backend round trip.
    pub operation_timeout: Duration,
}

impl Default for EdgeCacheConfig {
    fn default() -> Self {
        let ttl = Duration::from_secs(DEFAULT_TTL_SECS);
        Self {
            key: DEFAULT_KEY.to_string(),
            ttl,
            refresh_threshold: Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_SECS),
            retention: ttl * 2,
            refresh_concurrency: DEFAULT_REFRESH_CONCURRENCY,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for EdgeCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        let ttl = Duration::from_secs(u64::from(settings.ttl_secs.get()));
        let retention = settings
            .retention_secs
            .map(|secs| Duration::from_secs(u64::from(secs.get())))
            .unwrap_or(ttl * 2)
            .max(ttl);
        Self {
            key: settings.key.clone(),
            ttl,
            refresh_threshold: Duration::from_secs(u64::from(settings.refresh_threshold_secs))
                .min(ttl),
            retention,
            refresh_concurrency: settings.refresh_concurrency.get() as usize,
            operation_timeout: Duration::from_millis(u64::from(
                settings.operation_timeout_ms.get(),
            )),
        }
    }
}

impl EdgeCacheConfig {
    pub fn ttl_ms(&self) -> i64 {
        duration_ms(self.ttl)
    }

    pub fn refresh_threshold_ms(&self) -> i64 {
        duration_ms(self.refresh_threshold)
    }

    /// Seconds downstream caches may serve a stale copy while revalidating.
    pub fn stale_window_secs(&self) -> u64 {
        self.retention.saturating_sub(self.ttl).as_secs()
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
