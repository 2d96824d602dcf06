//! Cart and checkout service.
//!
//! Every read of the cart is reconciled against the live catalog, and
//! checkout re-validates from scratch instead of trusting an earlier view.

use std::sync::Arc;

use chrono::Utc;
use domains::cart::{self, CartView};
use domains::{
    Actor, DomainError, Order, OrderRepo, OrderStatus, Result, StoreItem, StoreRepo, User,
    UserRepo,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::access::require_admin;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub new_coin_balance: i64,
}

pub struct CartService {
    users: Arc<dyn UserRepo>,
    store: Arc<dyn StoreRepo>,
    orders: Arc<dyn OrderRepo>,
}

impl CartService {
    pub fn new(
        users: Arc<dyn UserRepo>,
        store: Arc<dyn StoreRepo>,
        orders: Arc<dyn OrderRepo>,
    ) -> Self {
        Self {
            users,
            store,
            orders,
        }
    }

    pub async fn get_cart(&self, actor: &Actor) -> Result<CartView> {
        let user = self.user(actor.user_id).await?;
        self.view(&user).await
    }

    /// Stock is not checked here; checkout enforces it.
    pub async fn add_to_cart(
        &self,
        actor: &Actor,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<CartView> {
        let quantity = cart::validate_quantity(quantity)?;
        let user = self.user(actor.user_id).await?;
        let next = cart::add_line(&user, item_id, quantity, Utc::now())?;
        let saved = self.users.save_cart(&next).await?;
        self.view(&saved).await
    }

    pub async fn update_quantity(
        &self,
        actor: &Actor,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<CartView> {
        let quantity = cart::validate_quantity(quantity)?;
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("StoreItem", item_id))?;
        let user = self.user(actor.user_id).await?;
        let next = cart::set_quantity(&user, &item, quantity)?;
        let saved = self.users.save_cart(&next).await?;
        self.view(&saved).await
    }

    pub async fn remove_from_cart(&self, actor: &Actor, item_id: Uuid) -> Result<CartView> {
        let user = self.user(actor.user_id).await?;
        let next = cart::remove_line(&user, item_id)?;
        let saved = self.users.save_cart(&next).await?;
        self.view(&saved).await
    }

    /// Validates the whole cart and balance, then commits in one unit.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn checkout(&self, actor: &Actor) -> Result<CheckoutReceipt> {
        let user = self.user(actor.user_id).await?;
        let catalog = self.catalog_for(&user).await?;
        let plan = cart::plan_checkout(&user, &catalog, Utc::now())?;

        self.orders.commit_checkout(&plan).await?;
        info!(
            order_id = %plan.order.id,
            total = plan.order.total_amount,
            lines = plan.order.items.len(),
            "checkout committed"
        );
        Ok(CheckoutReceipt {
            order_id: plan.order.id,
            new_coin_balance: plan.new_balance(),
        })
    }

    pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>> {
        self.orders.list_for_user(actor.user_id).await
    }

    /// Other users' orders are reported as missing rather than forbidden.
    pub async fn get_order(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        match self.orders.get(order_id).await? {
            Some(order) if order.user_id == actor.user_id || actor.is_admin() => Ok(order),
            _ => Err(DomainError::not_found("Order", order_id)),
        }
    }

    pub async fn update_order_status(
        &self,
        actor: &Actor,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order> {
        require_admin(actor)?;
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;
        let change = cart::plan_status_change(&order, status, Utc::now())?;
        let updated = self.orders.apply_status_change(&change).await?;
        info!(
            %order_id,
            from = change.from.as_str(),
            to = change.to.as_str(),
            refund = change.refund_coins,
            "order status changed"
        );
        Ok(updated)
    }

    async fn user(&self, id: Uuid) -> Result<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    async fn catalog_for(&self, user: &User) -> Result<Vec<StoreItem>> {
        let ids: Vec<Uuid> = user.cart.iter().map(|l| l.item_id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.get_items(&ids).await
    }

    async fn view(&self, user: &User) -> Result<CartView> {
        let catalog = self.catalog_for(user).await?;
        Ok(cart::view(user, &catalog))
    }
}
