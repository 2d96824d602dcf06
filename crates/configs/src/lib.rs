//! # configs
//!
//! Layered settings: `config/default.toml`, then `config/{FANHUB_ENV}.toml`,
//! then `FANHUB__SECTION__KEY` environment variables. A `.env` file in the
//! working directory is loaded first when present.

use std::net::SocketAddr;

use chrono::Duration;
use config::{Environment, File, FileFormat};
use domains::voting::EngineRules;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub media: MediaSettings,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|_| ConfigError::Invalid(format!("bad bind address {addr}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<SecretString>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

fn default_token_ttl_hours() -> i64 {
    24
}

impl AuthSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::hours(self.token_ttl_hours)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub root: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            root: "./data/covers".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".into(),
        }
    }
}

/// Engine thresholds as they appear in config files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub vote_cooldown_secs: i64,
    pub verify_net_votes: i64,
    pub fraud_downvotes: usize,
    pub report_threshold: u32,
    pub max_recent_submissions: u64,
    pub submission_window_secs: i64,
    pub max_downvote_ratio: f64,
    pub max_recent_votes: u64,
    pub vote_window_secs: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let rules = EngineRules::default();
        Self {
            vote_cooldown_secs: rules.vote_cooldown.num_seconds(),
            verify_net_votes: rules.verify_net_votes,
            fraud_downvotes: rules.fraud_downvotes,
            report_threshold: rules.report_threshold,
            max_recent_submissions: rules.max_recent_submissions,
            submission_window_secs: rules.submission_window.num_seconds(),
            max_downvote_ratio: rules.max_downvote_ratio,
            max_recent_votes: rules.max_recent_votes,
            vote_window_secs: rules.vote_window.num_seconds(),
        }
    }
}

impl EngineSettings {
    pub fn rules(&self) -> EngineRules {
        EngineRules {
            vote_cooldown: Duration::seconds(self.vote_cooldown_secs),
            verify_net_votes: self.verify_net_votes,
            fraud_downvotes: self.fraud_downvotes,
            report_threshold: self.report_threshold,
            max_recent_submissions: self.max_recent_submissions,
            submission_window: Duration::seconds(self.submission_window_secs),
            max_downvote_ratio: self.max_downvote_ratio,
            max_recent_votes: self.max_recent_votes,
            vote_window: Duration::seconds(self.vote_window_secs),
        }
    }
}

/// Per-user submission limit enforced by the rate limiter port.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub submissions: u64,
    pub submission_window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            submissions: 5,
            submission_window_secs: 3600,
        }
    }
}

impl RateLimitSettings {
    pub fn submission_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.submission_window_secs)
    }
}

impl Settings {
    /// Loads `.env`, the config files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "ignoring unreadable .env file");
            }
        }
        let env_name = std::env::var("FANHUB_ENV").unwrap_or_else(|_| "development".into());

        let settings: Settings = config::Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env_name}")).required(false))
            .add_source(
                Environment::with_prefix("FANHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses a single TOML document, without files or environment.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings: Settings = config::Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        use secrecy::ExposeSecret;

        if self.auth.jwt_secret.expose_secret().len() < 16 {
            return Err(ConfigError::Invalid(
                "auth.jwt_secret must be at least 16 bytes".into(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_hours must be positive".into()));
        }
        let e = &self.engine;
        if !(0.0..=1.0).contains(&e.max_downvote_ratio) {
            return Err(ConfigError::Invalid(
                "engine.max_downvote_ratio must be within 0..=1".into(),
            ));
        }
        if e.vote_cooldown_secs < 0 || e.submission_window_secs <= 0 || e.vote_window_secs <= 0 {
            return Err(ConfigError::Invalid("engine windows must be positive".into()));
        }
        if self.rate_limit.submissions == 0 || self.rate_limit.submission_window_secs == 0 {
            return Err(ConfigError::Invalid("rate_limit values must be positive".into()));
        }
        Ok(())
    }
}
