//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Repositories enforce optimistic concurrency through the `version` field
//! carried by `CraftlandCode` and `User`: a save whose version no longer
//! matches the stored one fails with `DomainError::Conflict`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cart::{CheckoutPlan, OrderStatusChange};
use crate::error::Result;
use crate::models::{
    Actor, CodeFilter, CraftlandCode, Notification, Order, Page, Pagination, StoreItem, User,
};

/// Persistence contract for craftland codes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CraftlandRepo: Send + Sync {
    /// Fails with `Conflict` if another code already uses `code.code`.
    async fn insert(&self, code: &CraftlandCode) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<CraftlandCode>>;
    async fn code_exists(&self, code: &str) -> Result<bool>;
    /// Writes the whole snapshot if the stored version equals `code.version`
    /// and returns it with the bumped version.
    async fn save(&self, code: &CraftlandCode) -> Result<CraftlandCode>;
    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn list(&self, filter: &CodeFilter, page: Pagination) -> Result<Page<CraftlandCode>>;
    /// Codes submitted by `user_id` at or after `since`.
    async fn count_submissions_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64>;
    /// Ballots cast by `user_id` across all codes at or after `since`.
    async fn count_votes_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64>;
}

/// Persistence contract for users and their embedded carts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: &User) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<User>>;
    /// Persists `user.cart` under the version check; returns the saved user.
    async fn save_cart(&self, user: &User) -> Result<User>;
}

/// Read access to the store catalog.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StoreRepo: Send + Sync {
    async fn upsert_item(&self, item: &StoreItem) -> Result<()>;
    async fn get_item(&self, id: Uuid) -> Result<Option<StoreItem>>;
    /// Items that exist among `ids`; missing ids are silently skipped.
    async fn get_items(&self, ids: &[Uuid]) -> Result<Vec<StoreItem>>;
}

/// Order persistence, including the checkout commit.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Applies a validated checkout as one unit: every stock reservation,
    /// the coin debit, the order insert and the cart clear. A reservation
    /// that no longer fits, or a stale user version, aborts the whole commit
    /// with `Conflict`.
    async fn commit_checkout(&self, plan: &CheckoutPlan) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Order>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    /// Moves an order from `change.from` to `change.to`, crediting
    /// `change.refund_coins` to its owner in the same unit.
    async fn apply_status_change(&self, change: &OrderStatusChange) -> Result<Order>;
}

/// Notification inbox collaborator.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn push(&self, notification: &Notification) -> Result<()>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>>;
}

/// Media storage contract for cover images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Saves raw bytes and returns an opaque blob id.
    async fn put(&self, data: Bytes, content_type: &mime::Mime) -> Result<String>;
    async fn delete(&self, blob_id: &str) -> Result<()>;
}

/// Counts hits per key inside a window shared by every server instance
/// that uses the same backend.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one hit for `key`; returns `false` once the window is full.
    async fn check(&self, key: &str) -> Result<bool>;
}

/// Identity contract: turns bearer tokens into actors.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthProvider: Send + Sync {
    fn verify_token(&self, token: &str) -> Result<Actor>;
    fn issue_token(&self, actor: &Actor) -> Result<String>;
}
