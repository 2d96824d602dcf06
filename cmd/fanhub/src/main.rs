//! # fanhub
//!
//! Assembles the server from the adapters selected at compile time.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState, Metrics};
use configs::{LogFormat, LogSettings, Settings};
use domains::{CraftlandRepo, NotificationRepo, OrderRepo, RateLimiter, StoreRepo, UserRepo};
use services::{CartService, CraftlandService};
use storage_adapters::{InMemoryRateLimiter, InMemoryStore, LocalBlobStore};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(not(all(feature = "web-axum", feature = "auth-jwt")))]
compile_error!("fanhub needs at least the `web-axum` and `auth-jwt` features");

struct Repositories {
    codes: Arc<dyn CraftlandRepo>,
    users: Arc<dyn UserRepo>,
    store: Arc<dyn StoreRepo>,
    orders: Arc<dyn OrderRepo>,
    notifications: Arc<dyn NotificationRepo>,
}

impl Repositories {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CraftlandRepo + UserRepo + StoreRepo + OrderRepo + NotificationRepo + 'static,
    {
        Self {
            codes: store.clone(),
            users: store.clone(),
            store: store.clone(),
            orders: store.clone(),
            notifications: store,
        }
    }
}

fn init_tracing(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn repositories(settings: &Settings) -> anyhow::Result<Repositories> {
    #[cfg(feature = "db-postgres")]
    {
        if let Some(url) = &settings.database.url {
            use secrecy::ExposeSecret;

            let pg = storage_adapters::PgStore::connect(
                url.expose_secret(),
                settings.database.max_connections,
            )
            .await
            .context("connecting to postgres")?;
            if settings.database.run_migrations {
                pg.run_migrations().await.context("running migrations")?;
            }
            info!("using postgres repositories");
            return Ok(Repositories::from_store(Arc::new(pg)));
        }
    }

    warn!(
        database_configured = settings.database.url.is_some(),
        "using in-memory repositories; data is lost on restart"
    );
    Ok(Repositories::from_store(Arc::new(InMemoryStore::new())))
}

fn submission_limiter(settings: &Settings) -> anyhow::Result<Arc<dyn RateLimiter>> {
    let limits = &settings.rate_limit;

    #[cfg(feature = "redis")]
    {
        if let Some(url) = &settings.redis.url {
            let limiter = storage_adapters::RedisRateLimiter::connect(
                url,
                limits.submissions,
                limits.submission_window(),
            )
            .context("creating redis pool")?;
            info!("using redis rate limiter");
            return Ok(Arc::new(limiter));
        }
    }

    Ok(Arc::new(InMemoryRateLimiter::new(
        limits.submissions,
        limits.submission_window(),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(&settings.log);

    let repos = repositories(&settings).await?;
    let limiter = submission_limiter(&settings)?;
    let blobs = Arc::new(LocalBlobStore::new(&settings.media.root));
    let auth = Arc::new(auth_adapters::JwtAuthProvider::new(
        &settings.auth.jwt_secret,
        settings.auth.token_ttl(),
    ));

    let craftland = CraftlandService::new(
        repos.codes,
        repos.notifications,
        blobs,
        limiter,
        settings.engine.rules(),
    );
    let cart = CartService::new(repos.users, repos.store, repos.orders);

    let state = AppState {
        craftland: Arc::new(craftland),
        cart: Arc::new(cart),
        auth,
        metrics: Arc::new(Metrics::new()),
    };
    let app = router::create(state, router::cors_layer(&settings.server.cors_origins));

    let addr = settings.server.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "fanhub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("fanhub stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
