//! # api-adapters
//!
//! HTTP surface of the fan-hub backend. The axum implementation sits behind
//! the `web-axum` feature; metrics are framework-agnostic.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod dto;
#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::Metrics;
#[cfg(feature = "web-axum")]
pub use state::AppState;
