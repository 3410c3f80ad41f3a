//! Key/value backends holding cached envelopes.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::lock::{read_or_recover, write_or_recover};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend `{backend}` failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
    #[error("cache backend `{backend}` timed out after {timeout_ms}ms")]
    Timeout {
        backend: &'static str,
        timeout_ms: u64,
    },
}

impl CacheError {
    pub fn backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            backend,
            message: err.to_string(),
        }
    }
}

/// String store with per-key expiry, shaped after Redis `GET` / `SET … PX`.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// In-process backend for single-instance deployments and tests.
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read_or_recover(&self.entries, "memory.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = read_or_recover(&self.entries, "memory.get");
            match entries.get(key) {
                Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        write_or_recover(&self.entries, "memory.evict")
            .retain(|_, (_, expires_at)| *expires_at > now);
        Ok(None)
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        write_or_recover(&self.entries, "memory.set")
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}
