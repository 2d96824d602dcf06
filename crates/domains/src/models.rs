//! # Domain Models
//!
//! These structs represent the core entities of fanhub.

pub mod craftland;
pub mod notification;
pub mod store;
pub mod user;

pub use craftland::*;
pub use notification::*;
pub use store::*;
pub use user::*;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}
