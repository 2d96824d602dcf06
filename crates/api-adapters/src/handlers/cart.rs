use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use domains::cart::CartView;
use services::CheckoutReceipt;
use uuid::Uuid;

use super::{body, ApiResult};
use crate::dto::{AddToCartRequest, OrderResponse, UpdateQuantityRequest};
use crate::extract::AuthUser;
use crate::state::AppState;

pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.cart.get_cart(&actor).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> ApiResult<Json<CartView>> {
    let request = body(payload)?;
    let view = state
        .cart
        .add_to_cart(&actor, request.item_id, request.quantity)
        .await?;
    Ok(Json(view))
}

pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(item_id): Path<Uuid>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> ApiResult<Json<CartView>> {
    let request = body(payload)?;
    let view = state
        .cart
        .update_quantity(&actor, item_id, request.quantity)
        .await?;
    Ok(Json(view))
}

pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.cart.remove_from_cart(&actor, item_id).await?))
}

pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<CheckoutReceipt>> {
    let result = state.cart.checkout(&actor).await;
    state
        .metrics
        .record_checkout(result.as_ref().map(|_| ()));
    Ok(Json(result?))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    let orders = state.cart.list_orders(&actor).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state.cart.get_order(&actor, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}
