use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::info;

use super::{Cache, CacheError};

/// Redis-backed cache. The connection manager reconnects on its own, so
/// every call works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        info!("Connected to redis cache");
        Ok(Self { conn })
    }
}

fn command_err(e: redis::RedisError) -> CacheError {
    CacheError::Command(e.to_string())
}

#[async_trait]
impl Cache for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(command_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(command_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SET EX rejects a zero expiry.
        if ttl.as_secs() == 0 {
            conn.set::<_, _, ()>(key, value).await.map_err(command_err)
        } else {
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
                .await
                .map_err(command_err)
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(command_err)
    }

    async fn close(&self) -> Result<(), CacheError> {
        // Connections are released when the last manager clone drops.
        Ok(())
    }
}
