//! # Cart & checkout rules
//!
//! Pure functions over the cart embedded in a `User`. Stock is only enforced
//! on explicit quantity updates and at checkout; adding to the cart never
//! looks at inventory.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::models::{
    CartLine, ItemType, Order, OrderLine, OrderStatus, PaymentDetails, StoreItem, User,
};

pub const MAX_LINE_QUANTITY: i64 = 999;
pub const PAYMENT_METHOD_COINS: &str = "coins";

/// Parses a client-supplied quantity into a valid line quantity.
pub fn validate_quantity(quantity: i64) -> Result<u32> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(DomainError::Validation(format!(
            "quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(quantity as u32)
}

/// Adds `quantity` of `item_id`, merging into an existing line.
pub fn add_line(user: &User, item_id: Uuid, quantity: u32, now: DateTime<Utc>) -> Result<User> {
    let mut next = user.clone();
    match next.cart.iter_mut().find(|l| l.item_id == item_id) {
        Some(line) => {
            let merged = i64::from(line.quantity) + i64::from(quantity);
            line.quantity = validate_quantity(merged)?;
        }
        None => next.cart.push(CartLine {
            item_id,
            quantity,
            added_at: now,
        }),
    }
    Ok(next)
}

/// Sets the quantity of an existing line, checking the live catalog entry.
pub fn set_quantity(user: &User, item: &StoreItem, quantity: u32) -> Result<User> {
    if !item.is_active {
        return Err(DomainError::Conflict(format!(
            "{} is no longer available",
            item.name
        )));
    }
    if let Some(available) = item.inventory {
        if quantity > available {
            return Err(DomainError::Conflict(format!(
                "Only {available} {}(s) available",
                item.name
            )));
        }
    }
    let mut next = user.clone();
    let line = next
        .cart
        .iter_mut()
        .find(|l| l.item_id == item.id)
        .ok_or_else(|| DomainError::not_found("CartLine", item.id))?;
    line.quantity = quantity;
    Ok(next)
}

pub fn remove_line(user: &User, item_id: Uuid) -> Result<User> {
    let mut next = user.clone();
    let before = next.cart.len();
    next.cart.retain(|l| l.item_id != item_id);
    if next.cart.len() == before {
        return Err(DomainError::not_found("CartLine", item_id));
    }
    Ok(next)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub item_id: Uuid,
    pub name: String,
    pub item_type: ItemType,
    pub coin_cost: i64,
    pub quantity: u32,
    pub inventory: Option<u32>,
    pub line_total: i64,
    /// False when the item was deactivated; such lines block checkout.
    pub item_exists: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total_cost: i64,
    /// Lines whose item was deleted from the catalog; hidden from `items`.
    pub missing_item_ids: Vec<Uuid>,
}

/// Joins the stored cart against the current catalog.
pub fn view(user: &User, catalog: &[StoreItem]) -> CartView {
    let mut items = Vec::with_capacity(user.cart.len());
    let mut missing_item_ids = Vec::new();
    let mut total_cost = 0i64;

    for line in &user.cart {
        let Some(item) = catalog.iter().find(|i| i.id == line.item_id) else {
            missing_item_ids.push(line.item_id);
            continue;
        };
        let line_total = if item.is_active {
            item.coin_cost.saturating_mul(i64::from(line.quantity))
        } else {
            0
        };
        total_cost = total_cost.saturating_add(line_total);
        items.push(CartLineView {
            item_id: item.id,
            name: item.name.clone(),
            item_type: item.item_type,
            coin_cost: item.coin_cost,
            quantity: line.quantity,
            inventory: item.inventory,
            line_total,
            item_exists: item.is_active,
            added_at: line.added_at,
        });
    }

    CartView {
        items,
        total_cost,
        missing_item_ids,
    }
}

/// One order line as seen by the commit. Every line is re-checked for
/// availability; stock is only taken from `limited` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockReservation {
    pub item_id: Uuid,
    pub quantity: u32,
    pub limited: bool,
}

/// A fully validated checkout, ready to commit as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPlan {
    pub user_id: Uuid,
    /// The commit fails if the user was saved since this snapshot was read.
    pub expected_user_version: u64,
    pub order: Order,
    /// One entry per order line, in cart order.
    pub reservations: Vec<StockReservation>,
}

impl CheckoutPlan {
    pub fn new_balance(&self) -> i64 {
        self.order.payment_details.coin_balance_after
    }
}

/// Validates every line and the balance, then freezes the order.
/// Nothing is reserved or debited here.
pub fn plan_checkout(user: &User, catalog: &[StoreItem], now: DateTime<Utc>) -> Result<CheckoutPlan> {
    if user.cart.is_empty() {
        return Err(DomainError::Validation("cart is empty".into()));
    }

    let mut lines = Vec::with_capacity(user.cart.len());
    let mut reservations = Vec::with_capacity(user.cart.len());
    let mut total = 0i64;

    for line in &user.cart {
        let item = catalog
            .iter()
            .find(|i| i.id == line.item_id)
            .ok_or_else(|| DomainError::not_found("StoreItem", line.item_id))?;
        if !item.is_active {
            return Err(DomainError::Conflict(format!(
                "{} is no longer available",
                item.name
            )));
        }
        if let Some(available) = item.inventory {
            if line.quantity > available {
                return Err(DomainError::Conflict(format!(
                    "Only {available} {}(s) available",
                    item.name
                )));
            }
        }
        reservations.push(StockReservation {
            item_id: item.id,
            quantity: line.quantity,
            limited: item.inventory.is_some(),
        });
        let line_total = item
            .coin_cost
            .checked_mul(i64::from(line.quantity))
            .ok_or_else(|| DomainError::Validation("order total overflows".into()))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| DomainError::Validation("order total overflows".into()))?;
        lines.push(OrderLine {
            item_id: item.id,
            name: item.name.clone(),
            item_type: item.item_type,
            quantity: line.quantity,
            price_at_purchase: item.coin_cost,
            metadata: item.metadata.clone(),
        });
    }

    if total > user.coins {
        return Err(DomainError::InsufficientFunds {
            required: total,
            available: user.coins,
        });
    }

    let order = Order {
        id: Uuid::new_v4(),
        user_id: user.id,
        items: lines,
        total_amount: total,
        status: OrderStatus::Completed,
        payment_details: PaymentDetails {
            transaction_id: format!("coin-{}", Uuid::new_v4().simple()),
            method: PAYMENT_METHOD_COINS.to_string(),
            timestamp: now,
            coin_balance_before: user.coins,
            coin_balance_after: user.coins - total,
        },
        created_at: now,
        updated_at: now,
    };

    Ok(CheckoutPlan {
        user_id: user.id,
        expected_user_version: user.version,
        order,
        reservations,
    })
}

/// An admin-driven order status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusChange {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Coins returned to the buyer; non-zero only for refunds.
    pub refund_coins: i64,
    pub at: DateTime<Utc>,
}

pub fn plan_status_change(
    order: &Order,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> Result<OrderStatusChange> {
    use OrderStatus::*;
    let allowed = matches!(
        (order.status, to),
        (Pending, Completed) | (Pending, Cancelled) | (Completed, Refunded)
    );
    if !allowed {
        return Err(DomainError::Conflict(format!(
            "order cannot move from {} to {}",
            order.status.as_str(),
            to.as_str()
        )));
    }
    Ok(OrderStatusChange {
        order_id: order.id,
        user_id: order.user_id,
        from: order.status,
        to,
        refund_coins: if to == Refunded { order.total_amount } else { 0 },
        at: now,
    })
}
