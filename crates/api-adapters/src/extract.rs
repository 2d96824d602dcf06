//! Bearer-token extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domains::{Actor, DomainError};

use crate::error::ApiError;
use crate::state::AppState;

/// Any authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

/// An authenticated caller with the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Actor);

fn bearer(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError(DomainError::Unauthorized("missing bearer token".into())))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let actor = state.auth.verify_token(bearer(parts)?)?;
        Ok(AuthUser(actor))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(actor) = AuthUser::from_request_parts(parts, state).await?;
        if !actor.is_admin() {
            return Err(ApiError(DomainError::Forbidden("admin role required".into())));
        }
        Ok(AdminUser(actor))
    }
}
