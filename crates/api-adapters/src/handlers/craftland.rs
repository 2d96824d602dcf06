use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use bytes::Bytes;
use domains::{CodeFilter, DomainError, NewCraftlandCode, NewReport, Page};
use uuid::Uuid;

use super::{body, ApiResult};
use crate::dto::{
    CodeResponse, ListCodesQuery, NotificationResponse, ReportResponse, VoteRequest, VoteResponse,
};
use crate::extract::AuthUser;
use crate::state::AppState;

pub async fn submit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    payload: Result<Json<NewCraftlandCode>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CodeResponse>)> {
    let code = state.craftland.submit(&actor, body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(CodeResponse::for_viewer(&code, &actor)),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    query: Result<Query<ListCodesQuery>, QueryRejection>,
) -> ApiResult<Json<Page<CodeResponse>>> {
    let Query(query) = query?;
    let filter = CodeFilter {
        status: query.status,
        submitted_by: query.submitted_by,
    };
    let page = state.craftland.list(&filter, query.pagination()).await?;
    Ok(Json(Page {
        items: page
            .items
            .iter()
            .map(|c| CodeResponse::for_viewer(c, &actor))
            .collect(),
        total: page.total,
        offset: page.offset,
        limit: page.limit,
    }))
}

pub async fn get_code(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CodeResponse>> {
    let code = state.craftland.get(id).await?;
    Ok(Json(CodeResponse::for_viewer(&code, &actor)))
}

pub async fn delete_code(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.craftland.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Raw image bytes; the type comes from `Content-Type`.
pub async fn upload_cover(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    data: Bytes,
) -> ApiResult<Json<CodeResponse>> {
    let content_type: mime::Mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| DomainError::Validation("missing or invalid Content-Type".into()))?;
    let code = state
        .craftland
        .set_cover_image(&actor, id, data, &content_type)
        .await?;
    Ok(Json(CodeResponse::for_viewer(&code, &actor)))
}

pub async fn vote(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<VoteResponse>> {
    let request = body(payload)?;
    let result = state.craftland.cast_vote(&actor, id, request.direction).await;
    state.metrics.record_vote(
        result
            .as_ref()
            .map(|o| o.verification_state_changed && o.is_now_verified),
    );
    Ok(Json(result?.into()))
}

pub async fn like(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<services::LikeOutcome>> {
    Ok(Json(state.craftland.toggle_like(&actor, id).await?))
}

pub async fn report(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<NewReport>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReportResponse>)> {
    let outcome = state.craftland.add_report(&actor, id, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

pub async fn notifications(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let inbox = state.craftland.notifications(&actor).await?;
    Ok(Json(inbox.iter().map(NotificationResponse::from).collect()))
}
