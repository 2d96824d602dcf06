//! Fixed-window rate limiter kept in process memory.
//!
//! Counters are per instance; deployments with more than one server should
//! enable the `redis` feature instead.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{RateLimiter, Result};

pub struct InMemoryRateLimiter {
    capacity: u64,
    window: Duration,
    windows: DashMap<String, (Instant, u64)>,
    last_sweep: Mutex<Instant>,
}

impl InMemoryRateLimiter {
    pub fn new(capacity: u64, window: Duration) -> Self {
        Self {
            capacity,
            window,
            windows: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Drops expired windows at most once per window length.
    fn sweep(&self, now: Instant) {
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.saturating_duration_since(*last) < self.window {
            return;
        }
        *last = now;
        drop(last);
        self.windows
            .retain(|_, (started, _)| now.saturating_duration_since(*started) < self.window);
    }

    fn hit(&self, key: &str, now: Instant) -> bool {
        self.sweep(now);
        let mut entry = self.windows.entry(key.to_owned()).or_insert((now, 0));
        let (started, count) = entry.value_mut();
        if now.saturating_duration_since(*started) >= self.window {
            *started = now;
            *count = 0;
        }
        *count += 1;
        *count <= self.capacity
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<bool> {
        Ok(self.hit(key, Instant::now()))
    }
}
