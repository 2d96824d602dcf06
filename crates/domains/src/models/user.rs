//! User domain model and the embedded shopping cart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    pub item_id: Uuid,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub coins: i64,
    /// At most one line per item; quantities are always >= 1.
    pub cart: Vec<CartLine>,
    /// Bumped by the repository on every successful save.
    pub version: u64,
}

impl User {
    pub fn new(username: impl Into<String>, role: Role, coins: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            role,
            coins,
            cart: Vec::new(),
            version: 0,
        }
    }
}

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
