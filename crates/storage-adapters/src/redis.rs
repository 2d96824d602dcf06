//! Redis-backed fixed-window rate limiter shared across server instances.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use domains::{RateLimiter, Result};

use crate::error::StorageError;

pub struct RedisRateLimiter {
    pool: Pool,
    capacity: u64,
    window: Duration,
    prefix: String,
}

impl RedisRateLimiter {
    pub fn connect(
        url: &str,
        capacity: u64,
        window: Duration,
    ) -> std::result::Result<Self, StorageError> {
        let pool = Config::from_url(url).create_pool(Some(Runtime::Tokio1))?;
        Ok(Self::with_pool(pool, capacity, window))
    }

    pub fn with_pool(pool: Pool, capacity: u64, window: Duration) -> Self {
        Self {
            pool,
            capacity,
            window,
            prefix: "fanhub:rl:".into(),
        }
    }

    async fn incr(&self, key: &str) -> std::result::Result<u64, StorageError> {
        let mut conn = self.pool.get().await?;
        let key = format!("{}{key}", self.prefix);
        // The window starts with the first hit; later hits only count.
        let (count,): (u64,) = deadpool_redis::redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("EX")
            .arg(self.window.as_secs().max(1))
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<bool> {
        let count = self.incr(key).await?;
        Ok(count <= self.capacity)
    }
}
