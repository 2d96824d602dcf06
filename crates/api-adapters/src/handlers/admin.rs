use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use super::{body, ApiResult};
use crate::dto::{
    CodeResponse, ModerationRequest, OrderResponse, OrderStatusRequest, ResolveReportRequest,
};
use crate::extract::AdminUser;
use crate::state::AppState;

pub async fn moderate_code(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<ModerationRequest>, JsonRejection>,
) -> ApiResult<Json<CodeResponse>> {
    let patch = body(payload)?.into();
    let code = state.craftland.moderate(&admin, id, patch).await?;
    Ok(Json(CodeResponse::for_viewer(&code, &admin)))
}

pub async fn resolve_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((id, report_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<ResolveReportRequest>, JsonRejection>,
) -> ApiResult<Json<CodeResponse>> {
    let request = body(payload)?;
    let code = state
        .craftland
        .resolve_report(&admin, id, report_id, request.status)
        .await?;
    Ok(Json(CodeResponse::for_viewer(&code, &admin)))
}

pub async fn update_order(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    payload: Result<Json<OrderStatusRequest>, JsonRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let request = body(payload)?;
    let order = state
        .cart
        .update_order_status(&admin, order_id, request.status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
