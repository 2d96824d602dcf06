//! Maps `DomainError` onto HTTP responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;

#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(DomainError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(DomainError::Validation(rejection.body_text()))
    }
}

pub fn status_of(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) | DomainError::InsufficientFunds { .. } => {
            StatusCode::BAD_REQUEST
        }
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) | DomainError::SuspiciousActivity(_) => StatusCode::CONFLICT,
        DomainError::Cooldown { .. } | DomainError::RateLimited(_) => {
            StatusCode::TOO_MANY_REQUESTS
        }
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        let message = match &self.0 {
            DomainError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "success": false,
            "error": message,
        });

        let mut response = (status, Json(body)).into_response();
        if let DomainError::Cooldown { retry_after_secs } = self.0 {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_carries_retry_after() {
        let response = ApiError(DomainError::Cooldown { retry_after_secs: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn status_table() {
        let cases = [
            (DomainError::Validation("x".into()), 400),
            (
                DomainError::InsufficientFunds {
                    required: 2,
                    available: 1,
                },
                400,
            ),
            (DomainError::Unauthorized("x".into()), 401),
            (DomainError::Forbidden("x".into()), 403),
            (DomainError::not_found("Order", 1), 404),
            (DomainError::Conflict("x".into()), 409),
            (DomainError::SuspiciousActivity("x".into()), 409),
            (DomainError::RateLimited("x".into()), 429),
            (DomainError::Internal("db down".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(status_of(&err).as_u16(), code, "{err:?}");
        }
    }
}
