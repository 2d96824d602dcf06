use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::cart::{CheckoutPlan, OrderStatusChange};
use domains::{
    CartLine, DomainError, Order, OrderLine, OrderRepo, PaymentDetails, Result, Role, StoreItem,
    StoreRepo, User, UserRepo,
};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{
    is_unique_violation, parse_enum, stale, to_i32, to_i64, to_u32, to_u64, DbResultExt, PgStore,
};
use crate::error::StorageError;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    role: String,
    coins: i64,
    cart: Json<Vec<CartLine>>,
    version: i64,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            role: parse_enum("role", row.role)?,
            coins: row.coins,
            cart: row.cart.0,
            version: to_u64(row.version, "version")?,
        })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Admin => "admin",
    }
}

#[derive(FromRow)]
struct ItemRow {
    id: Uuid,
    name: String,
    description: String,
    item_type: String,
    coin_cost: i64,
    inventory: Option<i32>,
    is_active: bool,
    metadata: Json<serde_json::Value>,
}

impl TryFrom<ItemRow> for StoreItem {
    type Error = DomainError;

    fn try_from(row: ItemRow) -> Result<Self> {
        Ok(StoreItem {
            id: row.id,
            name: row.name,
            description: row.description,
            item_type: parse_enum("item_type", row.item_type)?,
            coin_cost: row.coin_cost,
            inventory: row.inventory.map(|n| to_u32(n, "inventory")).transpose()?,
            is_active: row.is_active,
            metadata: row.metadata.0,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    items: Json<Vec<OrderLine>>,
    total_amount: i64,
    status: String,
    payment_details: Json<PaymentDetails>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            total_amount: row.total_amount,
            status: parse_enum("status", row.status)?,
            payment_details: row.payment_details.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, items, total_amount, status, payment_details, created_at, updated_at";

#[async_trait]
impl UserRepo for PgStore {
    async fn insert(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, role, coins, cart, version) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(role_str(user.role))
        .bind(user.coins)
        .bind(Json(&user.cart))
        .bind(to_i64(user.version, "version")?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::Conflict(format!(
                "username {} is taken",
                user.username
            ))),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, role, coins, cart, version FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .db()?;
        row.map(User::try_from).transpose()
    }

    async fn save_cart(&self, user: &User) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users SET cart = $3, version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING id, username, role, coins, cart, version",
        )
        .bind(user.id)
        .bind(to_i64(user.version, "version")?)
        .bind(Json(&user.cart))
        .fetch_optional(&self.pool)
        .await
        .db()?;

        match row {
            Some(row) => row.try_into(),
            None if UserRepo::get(self, user.id).await?.is_some() => Err(stale("cart")),
            None => Err(DomainError::not_found("User", user.id)),
        }
    }
}

#[async_trait]
impl StoreRepo for PgStore {
    async fn upsert_item(&self, item: &StoreItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO store_items \
             (id, name, description, item_type, coin_cost, inventory, is_active, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             description = EXCLUDED.description, item_type = EXCLUDED.item_type, \
             coin_cost = EXCLUDED.coin_cost, inventory = EXCLUDED.inventory, \
             is_active = EXCLUDED.is_active, metadata = EXCLUDED.metadata",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.item_type.as_str())
        .bind(item.coin_cost)
        .bind(item.inventory.map(|n| to_i32(n, "inventory")).transpose()?)
        .bind(item.is_active)
        .bind(Json(&item.metadata))
        .execute(&self.pool)
        .await
        .db()?;
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<StoreItem>> {
        let row: Option<ItemRow> = sqlx::query_as(
            "SELECT id, name, description, item_type, coin_cost, inventory, is_active, metadata \
             FROM store_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .db()?;
        row.map(StoreItem::try_from).transpose()
    }

    async fn get_items(&self, ids: &[Uuid]) -> Result<Vec<StoreItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            "SELECT id, name, description, item_type, coin_cost, inventory, is_active, metadata \
             FROM store_items WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .db()?;
        rows.into_iter().map(StoreItem::try_from).collect()
    }
}

#[async_trait]
impl OrderRepo for PgStore {
    async fn commit_checkout(&self, plan: &CheckoutPlan) -> Result<()> {
        let total = plan.order.total_amount;
        let mut tx = self.pool.begin().await.db()?;

        let locked: Option<(i64, i64)> =
            sqlx::query_as("SELECT coins, version FROM users WHERE id = $1 FOR UPDATE")
                .bind(plan.user_id)
                .fetch_optional(&mut *tx)
                .await
                .db()?;
        let (coins, version) =
            locked.ok_or_else(|| DomainError::not_found("User", plan.user_id))?;
        if version != to_i64(plan.expected_user_version, "version")? {
            return Err(stale("cart"));
        }
        if coins < total {
            return Err(DomainError::InsufficientFunds {
                required: total,
                available: coins,
            });
        }

        // Lock every line's item so availability cannot change before commit.
        for r in &plan.reservations {
            let current: Option<(String, Option<i32>, bool)> = sqlx::query_as(
                "SELECT name, inventory, is_active FROM store_items WHERE id = $1 FOR UPDATE",
            )
            .bind(r.item_id)
            .fetch_optional(&mut *tx)
            .await
            .db()?;
            let (name, inventory, is_active) =
                current.ok_or_else(|| DomainError::not_found("StoreItem", r.item_id))?;
            if !is_active {
                return Err(DomainError::Conflict(format!("{name} is no longer available")));
            }
            let quantity = to_i32(r.quantity, "quantity")?;
            if let Some(available) = inventory.filter(|n| *n < quantity) {
                return Err(DomainError::Conflict(format!(
                    "Only {available} {name}(s) available"
                )));
            }
            if inventory.is_some() {
                sqlx::query("UPDATE store_items SET inventory = inventory - $2 WHERE id = $1")
                    .bind(r.item_id)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await
                    .db()?;
            }
        }

        sqlx::query(
            "UPDATE users SET coins = coins - $2, cart = '[]'::jsonb, version = version + 1 \
             WHERE id = $1",
        )
        .bind(plan.user_id)
        .bind(total)
        .execute(&mut *tx)
        .await
        .db()?;

        let order = &plan.order;
        sqlx::query(
            "INSERT INTO orders \
             (id, user_id, items, total_amount, status, payment_details, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(Json(&order.payment_details))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .db()?;
        row.map(Order::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .db()?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn apply_status_change(&self, change: &OrderStatusChange) -> Result<Order> {
        let mut tx = self.pool.begin().await.db()?;

        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET status = $3, updated_at = $4 \
             WHERE id = $1 AND status = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(change.order_id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(change.at)
        .fetch_optional(&mut *tx)
        .await
        .db()?;
        let Some(row) = row else {
            drop(tx);
            return match OrderRepo::get(self, change.order_id).await? {
                Some(_) => Err(stale("order")),
                None => Err(DomainError::not_found("Order", change.order_id)),
            };
        };

        if change.refund_coins > 0 {
            sqlx::query("UPDATE users SET coins = coins + $2, version = version + 1 WHERE id = $1")
                .bind(change.user_id)
                .bind(change.refund_coins)
                .execute(&mut *tx)
                .await
                .db()?;
        }

        tx.commit().await.db()?;
        row.try_into()
    }
}
