//! Adapter-level errors. They collapse into `DomainError::Internal` at the
//! port boundary; conflicts are reported by the adapters directly.

use domains::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[cfg(feature = "db-postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "db-postgres")]
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[cfg(feature = "redis")]
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[cfg(feature = "redis")]
    #[error("redis pool setup error: {0}")]
    PoolSetup(#[from] deadpool_redis::CreatePoolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "storage failure");
        DomainError::Internal(err.to_string())
    }
}
