//! Stale-while-revalidate cache in front of an expensive fill.
//!
//! The backend stores `{"data": …, "expiresAt": <unix ms>}` and keeps it for
//! longer than the logical TTL, so a request can find an expired envelope and
//! still fall back to it when the synchronous refresh fails.

use std::{sync::Arc, time::SystemTime};

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::config::EdgeCacheConfig;
use crate::cache::refresh::BackgroundRefresher;
use crate::cache::store::CacheBackend;

pub const CACHE_OUTCOME_METRIC: &str = "noa_home_feed_cache_total";
pub const REFRESH_SKIPPED_METRIC: &str = "noa_home_feed_refresh_skipped_total";
pub const FILL_FAILURE_METRIC: &str = "noa_home_feed_fill_failures_total";

#[derive(Debug, Error)]
#[error("cache fill failed: {message}")]
pub struct FillError {
    message: String,
}

impl FillError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Produces the value cached under one key.
#[async_trait]
pub trait CacheFill: Send + Sync + 'static {
    type Value: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    async fn fill(&self) -> Result<Self::Value, FillError>;
}

/// How a value was obtained; sent to clients as `x-cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No usable backend: filled directly.
    Bypass,
    Hit,
    /// Served from cache with a background refresh scheduled.
    HitRefresh,
    /// Expired entry replaced synchronously.
    Refreshed,
    /// Expired entry served because the refresh failed.
    Stale,
    Miss,
}

impl CacheStatus {
    pub fn as_header(self) -> &'static str {
        match self {
            CacheStatus::Bypass => "BYPASS",
            CacheStatus::Hit => "HIT",
            CacheStatus::HitRefresh => "HIT-REFRESH",
            CacheStatus::Refreshed => "REFRESHED",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
        }
    }

    fn as_metric(self) -> &'static str {
        match self {
            CacheStatus::Bypass => "bypass",
            CacheStatus::Hit => "hit",
            CacheStatus::HitRefresh => "hit_refresh",
            CacheStatus::Refreshed => "refreshed",
            CacheStatus::Stale => "stale",
            CacheStatus::Miss => "miss",
        }
    }

    pub fn is_cacheable(self) -> bool {
        !matches!(self, CacheStatus::Bypass)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    data: T,
    expires_at: i64,
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

pub struct EdgeCache<F: CacheFill> {
    backend: Option<Arc<dyn CacheBackend>>,
    filler: Arc<F>,
    config: Arc<EdgeCacheConfig>,
    refresher: BackgroundRefresher,
}

impl<F: CacheFill> Clone for EdgeCache<F> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            filler: Arc::clone(&self.filler),
            config: Arc::clone(&self.config),
            refresher: self.refresher.clone(),
        }
    }
}

impl<F: CacheFill> EdgeCache<F> {
    pub fn new(
        backend: Option<Arc<dyn CacheBackend>>,
        filler: Arc<F>,
        config: EdgeCacheConfig,
    ) -> Self {
        let refresher = BackgroundRefresher::new(config.refresh_concurrency);
        Self {
            backend,
            filler,
            config: Arc::new(config),
            refresher,
        }
    }

    pub fn config(&self) -> &EdgeCacheConfig {
        &self.config
    }

    pub fn refresher(&self) -> &BackgroundRefresher {
        &self.refresher
    }

    pub async fn get(&self) -> Result<Cached<F::Value>, FillError> {
        self.get_at(now_ms()).await
    }

    /// Resolves the cached value as of `now` (unix ms).
    pub async fn get_at(&self, now: i64) -> Result<Cached<F::Value>, FillError> {
        let Some(backend) = self.backend.as_ref() else {
            return self.bypass().await;
        };

        let raw = match backend.get(&self.config.key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    target = "noa::cache",
                    key = %self.config.key,
                    backend = backend.name(),
                    error = %err,
                    "cache read failed; filling without cache"
                );
                return self.bypass().await;
            }
        };

        let envelope = raw.and_then(|raw| self.decode(&raw));
        let cached = match envelope {
            None => {
                let value = fill_and_store(backend.as_ref(), self.filler.as_ref(), &self.config, now).await?;
                Cached {
                    value,
                    status: CacheStatus::Miss,
                }
            }
            Some(envelope) if envelope.expires_at <= now => {
                match fill_and_store(backend.as_ref(), self.filler.as_ref(), &self.config, now).await {
                    Ok(value) => Cached {
                        value,
                        status: CacheStatus::Refreshed,
                    },
                    Err(err) => {
                        warn!(
                            target = "noa::cache",
                            key = %self.config.key,
                            expired_ms = now - envelope.expires_at,
                            error = %err,
                            "refresh failed; serving stale value"
                        );
                        Cached {
                            value: envelope.data,
                            status: CacheStatus::Stale,
                        }
                    }
                }
            }
            Some(envelope) => {
                let remaining = envelope.expires_at - now;
                let status = if remaining <= self.config.refresh_threshold_ms() {
                    self.schedule_refresh();
                    CacheStatus::HitRefresh
                } else {
                    CacheStatus::Hit
                };
                Cached {
                    value: envelope.data,
                    status,
                }
            }
        };

        record_outcome(cached.status);
        Ok(cached)
    }

    /// Fills and stores unconditionally; used to warm the cache ahead of traffic.
    pub async fn warm(&self) -> Result<Cached<F::Value>, FillError> {
        let Some(backend) = self.backend.as_ref() else {
            return self.bypass().await;
        };
        let value = fill_and_store(backend.as_ref(), self.filler.as_ref(), &self.config, now_ms()).await?;
        Ok(Cached {
            value,
            status: CacheStatus::Refreshed,
        })
    }

    async fn bypass(&self) -> Result<Cached<F::Value>, FillError> {
        let value = self.filler.fill().await.inspect_err(|_| {
            counter!(FILL_FAILURE_METRIC).increment(1);
        })?;
        record_outcome(CacheStatus::Bypass);
        Ok(Cached {
            value,
            status: CacheStatus::Bypass,
        })
    }

    fn decode(&self, raw: &str) -> Option<Envelope<F::Value>> {
        match serde_json::from_str(raw) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                warn!(
                    target = "noa::cache",
                    key = %self.config.key,
                    error = %err,
                    "discarding undecodable cache entry"
                );
                None
            }
        }
    }

    fn schedule_refresh(&self) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let filler = Arc::clone(&self.filler);
        let config = Arc::clone(&self.config);

        let task = async move {
            match fill_and_store(backend.as_ref(), filler.as_ref(), &config, now_ms()).await {
                Ok(_) => debug!(target = "noa::cache", key = %config.key, "background refresh stored"),
                Err(err) => warn!(
                    target = "noa::cache",
                    key = %config.key,
                    error = %err,
                    "background refresh failed"
                ),
            }
        };

        if let Err(reason) = self.refresher.try_spawn(&self.config.key, task) {
            debug!(
                target = "noa::cache",
                key = %self.config.key,
                reason = reason.as_str(),
                "background refresh skipped"
            );
            counter!(REFRESH_SKIPPED_METRIC, "reason" => reason.as_str()).increment(1);
        }
    }
}

async fn fill_and_store<F: CacheFill>(
    backend: &dyn CacheBackend,
    filler: &F,
    config: &EdgeCacheConfig,
    now: i64,
) -> Result<F::Value, FillError> {
    let value = filler.fill().await.inspect_err(|_| {
        counter!(FILL_FAILURE_METRIC).increment(1);
    })?;

    let envelope = Envelope {
        data: &value,
        expires_at: now + config.ttl_ms(),
    };
    match serde_json::to_string(&envelope) {
        Ok(payload) => {
            if let Err(err) = backend.set_px(&config.key, &payload, config.retention).await {
                warn!(
                    target = "noa::cache",
                    key = %config.key,
                    backend = backend.name(),
                    error = %err,
                    "cache write failed"
                );
            } else {
                info!(
                    target = "noa::cache",
                    key = %config.key,
                    expires_at = envelope.expires_at,
                    "cache entry stored"
                );
            }
        }
        Err(err) => warn!(
            target = "noa::cache",
            key = %config.key,
            error = %err,
            "cache value could not be serialized"
        ),
    }

    Ok(value)
}

fn record_outcome(status: CacheStatus) {
    counter!(CACHE_OUTCOME_METRIC, "outcome" => status.as_metric()).increment(1);
}
