//! Store catalog and order models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Digital,
    Physical,
    RedeemCode,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Digital => "digital",
            ItemType::Physical => "physical",
            ItemType::RedeemCode => "redeem_code",
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "digital" => Ok(ItemType::Digital),
            "physical" => Ok(ItemType::Physical),
            "redeem_code" => Ok(ItemType::RedeemCode),
            other => Err(format!("unknown item type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub item_type: ItemType,
    pub coin_cost: i64,
    /// `None` means unlimited stock.
    pub inventory: Option<u32>,
    pub is_active: bool,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Frozen snapshot of a purchased line. Later catalog edits never touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub name: String,
    pub item_type: ItemType,
    pub quantity: u32,
    pub price_at_purchase: i64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentDetails {
    pub transaction_id: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub coin_balance_before: i64,
    pub coin_balance_after: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_details: PaymentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
