//! # In-memory repositories
//!
//! One lock guards every collection, so multi-entity operations such as the
//! checkout commit are atomic. Used for tests and single-node development;
//! contents vanish on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::cart::{CheckoutPlan, OrderStatusChange};
use domains::{
    CodeFilter, CraftlandCode, CraftlandRepo, DomainError, Notification, NotificationRepo, Order,
    OrderRepo, Page, Pagination, Result, StoreItem, StoreRepo, User, UserRepo,
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    codes: HashMap<Uuid, CraftlandCode>,
    users: HashMap<Uuid, User>,
    items: HashMap<Uuid, StoreItem>,
    orders: HashMap<Uuid, Order>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stale(entity: &str) -> DomainError {
    DomainError::Conflict(format!("{entity} was modified concurrently, retry"))
}

#[async_trait]
impl CraftlandRepo for InMemoryStore {
    async fn insert(&self, code: &CraftlandCode) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.codes.values().any(|c| c.code == code.code) {
            return Err(DomainError::Conflict(format!(
                "code {} was already submitted",
                code.code
            )));
        }
        state.codes.insert(code.id, code.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<CraftlandCode>> {
        Ok(self.state.lock().await.codes.get(&id).cloned())
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        Ok(self.state.lock().await.codes.values().any(|c| c.code == code))
    }

    async fn save(&self, code: &CraftlandCode) -> Result<CraftlandCode> {
        let mut state = self.state.lock().await;
        let stored = state
            .codes
            .get_mut(&code.id)
            .ok_or_else(|| DomainError::not_found("CraftlandCode", code.id))?;
        if stored.version != code.version {
            return Err(stale("craftland code"));
        }
        let mut next = code.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.lock().await.codes.remove(&id).is_some())
    }

    async fn list(&self, filter: &CodeFilter, page: Pagination) -> Result<Page<CraftlandCode>> {
        let state = self.state.lock().await;
        let mut matching: Vec<&CraftlandCode> = state
            .codes
            .values()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.submitted_by.map_or(true, |u| c.submitted_by == u))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(Page {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .cloned()
                .collect(),
            offset: page.offset,
            limit: page.limit,
        })
    }

    async fn count_submissions_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .codes
            .values()
            .filter(|c| c.submitted_by == user_id && c.created_at >= since)
            .count() as u64)
    }

    async fn count_votes_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .codes
            .values()
            .map(|c| c.ballots_by_since(user_id, since) as u64)
            .sum())
    }
}

#[async_trait]
impl UserRepo for InMemoryStore {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(DomainError::Conflict(format!(
                "username {} is taken",
                user.username
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn save_cart(&self, user: &User) -> Result<User> {
        let mut state = self.state.lock().await;
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| DomainError::not_found("User", user.id))?;
        if stored.version != user.version {
            return Err(stale("cart"));
        }
        stored.cart = user.cart.clone();
        stored.version += 1;
        Ok(stored.clone())
    }
}

#[async_trait]
impl StoreRepo for InMemoryStore {
    async fn upsert_item(&self, item: &StoreItem) -> Result<()> {
        self.state.lock().await.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<StoreItem>> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn get_items(&self, ids: &[Uuid]) -> Result<Vec<StoreItem>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.items.get(id).cloned()).collect())
    }
}

#[async_trait]
impl OrderRepo for InMemoryStore {
    async fn commit_checkout(&self, plan: &CheckoutPlan) -> Result<()> {
        let mut state = self.state.lock().await;
        let total = plan.order.total_amount;

        // Validate everything under the lock before touching anything.
        let user = state
            .users
            .get(&plan.user_id)
            .ok_or_else(|| DomainError::not_found("User", plan.user_id))?;
        if user.version != plan.expected_user_version {
            return Err(stale("cart"));
        }
        if user.coins < total {
            return Err(DomainError::InsufficientFunds {
                required: total,
                available: user.coins,
            });
        }
        for r in &plan.reservations {
            let item = state
                .items
                .get(&r.item_id)
                .ok_or_else(|| DomainError::not_found("StoreItem", r.item_id))?;
            if !item.is_active {
                return Err(DomainError::Conflict(format!(
                    "{} is no longer available",
                    item.name
                )));
            }
            if let Some(available) = item.inventory.filter(|n| *n < r.quantity) {
                return Err(DomainError::Conflict(format!(
                    "Only {available} {}(s) available",
                    item.name
                )));
            }
        }

        for r in &plan.reservations {
            if let Some(item) = state.items.get_mut(&r.item_id) {
                item.inventory = item.inventory.map(|n| n - r.quantity);
            }
        }
        if let Some(user) = state.users.get_mut(&plan.user_id) {
            user.coins -= total;
            user.cart.clear();
            user.version += 1;
        }
        state.orders.insert(plan.order.id, plan.order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn apply_status_change(&self, change: &OrderStatusChange) -> Result<Order> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&change.order_id)
            .ok_or_else(|| DomainError::not_found("Order", change.order_id))?;
        if order.status != change.from {
            return Err(stale("order"));
        }
        order.status = change.to;
        order.updated_at = change.at;
        let updated = order.clone();

        if change.refund_coins > 0 {
            let user = state
                .users
                .get_mut(&change.user_id)
                .ok_or_else(|| DomainError::not_found("User", change.user_id))?;
            user.coins += change.refund_coins;
            user.version += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl NotificationRepo for InMemoryStore {
    async fn push(&self, notification: &Notification) -> Result<()> {
        self.state.lock().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::cart::{self, plan_checkout};
    use domains::{ItemType, NewCraftlandCode, Role};

    fn item(inventory: Option<u32>) -> StoreItem {
        StoreItem {
            id: Uuid::new_v4(),
            name: "Skin".into(),
            description: String::new(),
            item_type: ItemType::Digital,
            coin_cost: 10,
            inventory,
            is_active: true,
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn stale_code_save_is_rejected() {
        let store = InMemoryStore::new();
        let code = CraftlandCode::new(
            NewCraftlandCode {
                code: "A".into(),
                title: "A".into(),
                ..Default::default()
            },
            Uuid::new_v4(),
            Utc::now(),
        );
        CraftlandRepo::insert(&store, &code).await.unwrap();

        let saved = store.save(&code).await.unwrap();
        assert_eq!(saved.version, 1);
        assert!(matches!(store.save(&code).await, Err(DomainError::Conflict(_))));
        assert!(matches!(
            CraftlandRepo::insert(&store, &code).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn second_commit_of_same_cart_fails_without_debit() {
        let store = InMemoryStore::new();
        let skin = item(Some(5));
        store.upsert_item(&skin).await.unwrap();
        let user = User::new("p", Role::User, 100);
        UserRepo::insert(&store, &user).await.unwrap();

        let user = cart::add_line(&user, skin.id, 2, Utc::now()).unwrap();
        let user = store.save_cart(&user).await.unwrap();
        let plan = plan_checkout(&user, &[skin.clone()], Utc::now()).unwrap();

        store.commit_checkout(&plan).await.unwrap();
        assert!(matches!(
            store.commit_checkout(&plan).await,
            Err(DomainError::Conflict(_))
        ));

        let after = UserRepo::get(&store, user.id).await.unwrap().unwrap();
        assert_eq!(after.coins, 80);
        assert!(after.cart.is_empty());
        let stock = store.get_item(skin.id).await.unwrap().unwrap().inventory;
        assert_eq!(stock, Some(3));
        assert_eq!(OrderRepo::list_for_user(&store, user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reservation_beyond_stock_aborts_commit() {
        let store = InMemoryStore::new();
        let skin = item(Some(1));
        store.upsert_item(&skin).await.unwrap();
        let user = User::new("q", Role::User, 100);
        UserRepo::insert(&store, &user).await.unwrap();

        let user = cart::add_line(&user, skin.id, 1, Utc::now()).unwrap();
        let user = store.save_cart(&user).await.unwrap();
        let plan = plan_checkout(&user, &[skin.clone()], Utc::now()).unwrap();

        // Stock sold elsewhere after the plan was made.
        let mut sold_out = skin.clone();
        sold_out.inventory = Some(0);
        store.upsert_item(&sold_out).await.unwrap();

        assert!(store.commit_checkout(&plan).await.is_err());
        let after = UserRepo::get(&store, user.id).await.unwrap().unwrap();
        assert_eq!(after.coins, 100);
        assert_eq!(after.cart.len(), 1);
    }

    #[tokio::test]
    async fn unlimited_item_deactivated_after_plan_aborts_commit() {
        let store = InMemoryStore::new();
        let skin = item(None);
        store.upsert_item(&skin).await.unwrap();
        let user = User::new("r", Role::User, 100);
        UserRepo::insert(&store, &user).await.unwrap();

        let user = cart::add_line(&user, skin.id, 1, Utc::now()).unwrap();
        let user = store.save_cart(&user).await.unwrap();
        let plan = plan_checkout(&user, &[skin.clone()], Utc::now()).unwrap();

        let mut retired = skin.clone();
        retired.is_active = false;
        store.upsert_item(&retired).await.unwrap();

        assert_eq!(
            store.commit_checkout(&plan).await,
            Err(DomainError::Conflict("Skin is no longer available".into()))
        );
        let after = UserRepo::get(&store, user.id).await.unwrap().unwrap();
        assert_eq!(after.coins, 100);
        assert_eq!(after.cart.len(), 1);
        assert!(OrderRepo::list_for_user(&store, user.id).await.unwrap().is_empty());
    }
}
