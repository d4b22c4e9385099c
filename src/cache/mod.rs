//! Key-value cache used to memoize the summary report.
//!
//! Two interchangeable backends sit behind the [`Cache`] trait and one is
//! picked at startup from `CACHE_MODE`:
//!
//! | Backend | TTL | Shared between processes |
//! |---------|-----|--------------------------|
//! | `local` | ignored, entries live until deleted | no |
//! | `redis` | native `SET EX` | yes |

mod local;
mod redis;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CacheMode, Config, ConfigError};

pub use self::local::LocalCache;
pub use self::redis::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),
    #[error("cache command failed: {0}")]
    Command(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[async_trait]
pub trait Cache: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), CacheError>;

    /// `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn close(&self) -> Result<(), CacheError>;
}

pub async fn from_config(config: &Config) -> Result<Arc<dyn Cache>, CacheError> {
    match config.cache_mode()? {
        CacheMode::Local => Ok(Arc::new(LocalCache::new())),
        CacheMode::Redis => Ok(Arc::new(RedisCache::connect(&config.redis_url).await?)),
    }
}
