//! Redis-backed edge cache store (Upstash or self-hosted).

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use tokio::{sync::Mutex, time::timeout};
use tracing::debug;

use crate::cache::store::{CacheBackend, CacheError};

const BACKEND: &str = "redis";

pub struct RedisCacheBackend {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    operation_timeout: Duration,
}

impl RedisCacheBackend {
    /// Parses `url` without connecting; the first operation opens the connection.
    pub fn new(url: &str, operation_timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|err| CacheError::backend(BACKEND, err))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            operation_timeout,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .bounded(self.client.get_multiplexed_async_connection())
            .await?;
        debug!(target = "noa::cache::redis", "opened redis connection");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        self.connection.lock().await.take();
    }

    async fn bounded<T, Fut>(&self, op: Fut) -> Result<T, CacheError>
    where
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.operation_timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CacheError::backend(BACKEND, err)),
            Err(_) => Err(CacheError::Timeout {
                backend: BACKEND,
                timeout_ms: u64::try_from(self.operation_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let result = self.bounded(conn.get::<_, Option<String>>(key)).await;
        if result.is_err() {
            self.reset().await;
        }
        result
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let result = self.bounded(conn.pset_ex::<_, _, ()>(key, value, millis)).await;
        if result.is_err() {
            self.reset().await;
        }
        result
    }
}
