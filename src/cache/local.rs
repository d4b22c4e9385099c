use std::{collections::HashMap, sync::RwLock, time::Duration};

use async_trait::async_trait;

use super::{Cache, CacheError};

/// In-process map behind a single reader/writer lock. Expiry is not enforced;
/// entries stay until they are deleted or the process exits.
#[derive(Debug, Default)]
pub struct LocalCache {
    data: RwLock<HashMap<String, String>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Command("local cache lock poisoned".to_string())
}

#[async_trait]
impl Cache for LocalCache {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), CacheError> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
