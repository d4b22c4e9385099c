use std::env;

use thiserror::Error;
use tracing::{info, warn};

const LOCAL_ENV: &str = "local";
const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;
/// Ten years.
pub const MAX_SESSION_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Local,
    Redis,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PG_DSN is required when APP_ENV is not local")]
    MissingPgDsn,
    #[error("CORS_ALLOW_ORIGIN is required when APP_ENV is not local")]
    MissingCorsOrigin,
    #[error("CORS_ALLOW_ORIGIN cannot be * when APP_ENV is not local")]
    WildcardCorsOrigin,
    #[error("CACHE_MODE must be local or redis, got {0:?}")]
    InvalidCacheMode(String),
    #[error("REDIS_URL is required when CACHE_MODE=redis")]
    MissingRedisUrl,
    #[error("AUTH_SESSION_TTL_SECS must not exceed {MAX_SESSION_TTL_SECS}, got {0}")]
    InvalidSessionTtl(i64),
}

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub env: String,
    pub port: u16,
    pub sqlite_path: String,
    pub pg_dsn: String,
    pub redis_url: String,
    /// Raw `CACHE_MODE`; see [`Config::cache_mode`].
    pub cache_mode: String,
    pub cors_allow_origin: String,
    pub session_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let app_env = getenv("APP_ENV", LOCAL_ENV);
        let is_local = app_env == LOCAL_ENV;

        let cors_default = if is_local { "*" } else { "" };
        let cache_default = if is_local { "local" } else { "redis" };

        Self {
            port: parse_or("PORT", 8080),
            sqlite_path: getenv("SQLITE_PATH", "./data/app.db"),
            pg_dsn: getenv("PG_DSN", ""),
            redis_url: getenv("REDIS_URL", "redis://127.0.0.1:6379/0"),
            cache_mode: getenv("CACHE_MODE", cache_default),
            cors_allow_origin: getenv("CORS_ALLOW_ORIGIN", cors_default),
            session_ttl_secs: parse_or("AUTH_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
            env: app_env,
        }
    }

    /// Settings for an in-process instance: SQLite in memory and the local cache.
    pub fn local_in_memory() -> Self {
        Self {
            env: LOCAL_ENV.to_string(),
            port: 8080,
            sqlite_path: ":memory:".to_string(),
            pg_dsn: String::new(),
            redis_url: String::new(),
            cache_mode: "local".to_string(),
            cors_allow_origin: "*".to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }

    pub fn is_local(&self) -> bool {
        self.env == LOCAL_ENV
    }

    pub fn database_driver(&self) -> &'static str {
        if self.is_local() {
            "sqlite"
        } else {
            "pgsql"
        }
    }

    pub fn cache_mode(&self) -> Result<CacheMode, ConfigError> {
        match self.cache_mode.as_str() {
            "local" => Ok(CacheMode::Local),
            "redis" => Ok(CacheMode::Redis),
            other => Err(ConfigError::InvalidCacheMode(other.to_string())),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_local() {
            if self.pg_dsn.is_empty() {
                return Err(ConfigError::MissingPgDsn);
            }
            if self.cors_allow_origin.is_empty() {
                return Err(ConfigError::MissingCorsOrigin);
            }
            if self.cors_allow_origin == "*" {
                return Err(ConfigError::WildcardCorsOrigin);
            }
        }
        // Zero or negative is allowed and yields sessions that never validate.
        if self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::InvalidSessionTtl(self.session_ttl_secs));
        }
        if self.cache_mode()? == CacheMode::Redis && self.redis_url.is_empty() {
            return Err(ConfigError::MissingRedisUrl);
        }
        Ok(())
    }
}

/// Empty values count as unset.
fn getenv(key: &str, fallback: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => fallback.to_string(),
    }
}

fn parse_or<T>(key: &str, fallback: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid {key} value {raw:?}, using default: {fallback}");
            fallback
        }),
        _ => {
            info!("{key} not set, using default: {fallback}");
            fallback
        }
    }
}
