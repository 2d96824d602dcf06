use std::sync::Arc;

use domains::AuthProvider;
use services::{CartService, CraftlandService};

use crate::metrics::Metrics;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub craftland: Arc<CraftlandService>,
    pub cart: Arc<CartService>,
    pub auth: Arc<dyn AuthProvider>,
    pub metrics: Arc<Metrics>,
}
