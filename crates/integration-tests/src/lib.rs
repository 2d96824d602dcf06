//! Shared wiring for the integration tests: the real services over the
//! in-memory adapters, and (with `web-axum`) the real router on top.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use auth_adapters::JwtAuthProvider;
use chrono::Duration;
use domains::voting::EngineRules;
use domains::{
    Actor, AuthProvider, CraftlandCode, ItemType, NewCraftlandCode, Notification,
    NotificationRepo, Role, StoreItem, StoreRepo, User, UserRepo,
};
use secrecy::SecretString;
use services::{CartService, CraftlandService};
use storage_adapters::{InMemoryBlobStore, InMemoryRateLimiter, InMemoryStore};
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";

/// Smallest byte string the image sniffer accepts as a PNG.
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

/// Default thresholds without the per-code cooldown, so many voters can
/// act on one code back to back.
pub fn rules_without_cooldown() -> EngineRules {
    EngineRules {
        vote_cooldown: Duration::zero(),
        ..EngineRules::default()
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub auth: Arc<JwtAuthProvider>,
    pub craftland: Arc<CraftlandService>,
    pub cart: Arc<CartService>,
}

impl Harness {
    pub fn new(rules: EngineRules) -> Self {
        Self::with_submission_limit(rules, 100)
    }

    pub fn with_submission_limit(rules: EngineRules, submissions: u64) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let limiter = Arc::new(InMemoryRateLimiter::new(
            submissions,
            StdDuration::from_secs(3600),
        ));
        let auth = Arc::new(JwtAuthProvider::new(
            &SecretString::from(TEST_SECRET.to_string()),
            Duration::hours(1),
        ));

        let craftland = CraftlandService::new(
            store.clone(),
            store.clone(),
            blobs.clone(),
            limiter,
            rules,
        );
        let cart = CartService::new(store.clone(), store.clone(), store.clone());

        Self {
            store,
            blobs,
            auth,
            craftland: Arc::new(craftland),
            cart: Arc::new(cart),
        }
    }

    /// Registers a user and returns the matching actor.
    pub async fn user(&self, username: &str, role: Role, coins: i64) -> Actor {
        let user = User::new(username, role, coins);
        UserRepo::insert(self.store.as_ref(), &user)
            .await
            .expect("insert user");
        Actor {
            user_id: user.id,
            role,
        }
    }

    /// An actor with no stored profile, enough for voting and reporting.
    pub fn voter(&self) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role: Role::User,
        }
    }

    pub async fn item(&self, name: &str, coin_cost: i64, inventory: Option<u32>) -> StoreItem {
        let item = StoreItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} for testing"),
            item_type: ItemType::Digital,
            coin_cost,
            inventory,
            is_active: true,
            metadata: serde_json::json!({}),
        };
        self.store.upsert_item(&item).await.expect("upsert item");
        item
    }

    pub async fn submit(&self, owner: &Actor, code: &str) -> CraftlandCode {
        self.craftland
            .submit(
                owner,
                NewCraftlandCode {
                    code: code.to_string(),
                    title: format!("Map {code}"),
                    description: "obstacle course".into(),
                    ..Default::default()
                },
            )
            .await
            .expect("submit code")
    }

    pub async fn stored_user(&self, user_id: Uuid) -> User {
        UserRepo::get(self.store.as_ref(), user_id)
            .await
            .expect("load user")
            .expect("user exists")
    }

    pub async fn stored_item(&self, item_id: Uuid) -> StoreItem {
        self.store
            .get_item(item_id)
            .await
            .expect("load item")
            .expect("item exists")
    }

    pub async fn inbox(&self, user_id: Uuid) -> Vec<Notification> {
        NotificationRepo::list_for_user(self.store.as_ref(), user_id)
            .await
            .expect("load notifications")
    }

    pub fn token(&self, actor: &Actor) -> String {
        self.auth.issue_token(actor).expect("issue token")
    }
}

#[cfg(feature = "web-axum")]
pub mod http {
    //! Drives the router in-process with `tower::ServiceExt::oneshot`.

    use std::sync::Arc;

    use api_adapters::{router, AppState, Metrics};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, HeaderMap, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::Harness;

    pub struct Reply {
        pub status: StatusCode,
        pub headers: HeaderMap,
        pub body: Value,
    }

    impl Harness {
        pub fn router(&self) -> Router {
            let state = AppState {
                craftland: self.craftland.clone(),
                cart: self.cart.clone(),
                auth: self.auth.clone(),
                metrics: Arc::new(Metrics::new()),
            };
            router::create(state, router::cors_layer(&[]))
        }
    }

    pub fn request(
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).expect("build request")
    }

    pub async fn send(app: &Router, req: Request<Body>) -> Reply {
        let response = app.clone().oneshot(req).await.expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Reply {
            status,
            headers,
            body,
        }
    }
}
