//! HTTP router setup.

use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::routing::{get, patch, post, put};
use axum::Router;
use services::craftland::MAX_COVER_BYTES;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, admin, cart, craftland};
use crate::state::AppState;

const REQUEST_ID: &str = "x-request-id";

/// Builds the CORS policy. An empty list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .max_age(Duration::from_secs(600));
    if origins.is_empty() {
        return base.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Create the application router.
pub fn create(state: AppState, cors: CorsLayer) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Codes
        .route(
            "/craftland-codes",
            post(craftland::submit).get(craftland::list),
        )
        .route(
            "/craftland-codes/{id}",
            get(craftland::get_code).delete(craftland::delete_code),
        )
        .route(
            "/craftland-codes/{id}/cover",
            put(craftland::upload_cover).layer(DefaultBodyLimit::max(MAX_COVER_BYTES)),
        )
        .route("/craftland-codes/{id}/vote", post(craftland::vote))
        .route("/craftland-codes/{id}/like", post(craftland::like))
        .route("/craftland-codes/{id}/report", post(craftland::report))
        // Profile
        .route("/profile/cart", get(cart::get_cart).post(cart::add_item))
        .route(
            "/profile/cart/{item_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/profile/cart/checkout", post(cart::checkout))
        .route("/profile/orders", get(cart::list_orders))
        .route("/profile/orders/{id}", get(cart::get_order))
        .route("/profile/notifications", get(craftland::notifications))
        // Admin
        .route("/admin/craftland-codes/{id}", patch(admin::moderate_code))
        .route(
            "/admin/craftland-codes/{id}/reports/{report_id}",
            patch(admin::resolve_report),
        )
        .route("/admin/orders/{id}", patch(admin::update_order))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        let id = req
                            .headers()
                            .get(REQUEST_ID)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "http",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id = %id,
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
