//! # Postgres adapter
//!
//! One `PgStore` implements every repository port over a shared pool.
//! Nested collections (ballots, likes, reports, cart lines, order lines) are
//! stored as JSONB next to the row that owns them, so a code or a user is
//! always written as one row under its version check.

mod commerce;
mod craftland;
mod inbox;

use std::time::Duration;

use domains::DomainError;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::StorageError;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps driver errors into the port error type.
trait DbResultExt<T> {
    fn db(self) -> domains::Result<T>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn db(self) -> domains::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Decodes a lowercase enum column through its serde representation.
fn parse_enum<T: DeserializeOwned>(column: &str, value: String) -> domains::Result<T> {
    serde_json::from_value(serde_json::Value::String(value))
        .map_err(|_| StorageError::Corrupt(format!("bad {column} value")).into())
}

fn to_i64(value: u64, column: &str) -> domains::Result<i64> {
    i64::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} out of range")).into())
}

fn to_u64(value: i64, column: &str) -> domains::Result<u64> {
    u64::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} is negative")).into())
}

fn to_u32(value: i32, column: &str) -> domains::Result<u32> {
    u32::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} is negative")).into())
}

fn to_i32(value: u32, column: &str) -> domains::Result<i32> {
    i32::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} out of range")).into())
}

fn stale(entity: &str) -> DomainError {
    DomainError::Conflict(format!("{entity} was modified concurrently, retry"))
}
