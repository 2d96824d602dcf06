//! Axum handlers. Each one extracts, calls a service, and shapes the reply;
//! no rule lives here.

pub mod admin;
pub mod cart;
pub mod craftland;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use domains::DomainError;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub type ApiResult<T> = Result<T, ApiError>;

/// Unwraps a JSON body, turning a malformed one into a validation error.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(inner)| inner).map_err(ApiError::from)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let text = state
        .metrics
        .encode()
        .map_err(|e| DomainError::Internal(format!("metrics encoding failed: {e}")))?;
    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        text,
    ))
}
