//! # DomainError
//!
//! Centralized error handling for the fanhub workspace.
//! Every port and service returns this type; the HTTP layer maps each
//! variant onto a status code.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input (e.g., empty title, quantity below one)
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed (e.g., not the owner, not an admin)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (e.g., CraftlandCode, StoreItem, Order)
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: String, id: String },

    /// State conflict (duplicate report, stale version, out of stock)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient coins: order costs {required}, balance is {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// A fraud heuristic tripped on the voting user
    #[error("suspicious activity detected: {0}")]
    SuspiciousActivity(String),

    /// The per-code vote cooldown is still running
    #[error("voting on this code is cooling down, retry in {retry_after_secs}s")]
    Cooldown { retry_after_secs: u64 },

    /// Rate limit exceeded
    #[error("too many requests: {0}")]
    RateLimited(String),

    /// Infrastructure failure (e.g., DB down, blob store unreachable)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;
