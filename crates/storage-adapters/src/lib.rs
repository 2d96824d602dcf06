//! # storage-adapters
//!
//! Implementations of the persistence, media and rate-limit ports.
//! In-memory adapters are always compiled; Postgres and Redis sit behind
//! the `db-postgres` and `redis` features.

pub mod error;
pub mod media;
pub mod memory;
pub mod rate_limit;

#[cfg(feature = "db-postgres")]
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis;

pub use error::StorageError;
pub use media::{InMemoryBlobStore, LocalBlobStore};
pub use memory::InMemoryStore;
pub use rate_limit::InMemoryRateLimiter;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
#[cfg(feature = "redis")]
pub use redis::RedisRateLimiter;
