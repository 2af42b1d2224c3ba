//! In-memory profile store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ProfileStore, StorageError};

/// Profile store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryProfileStore::new();
        assert_eq!(store.get("cart").await.unwrap(), None);

        store.set("cart", "[]").await.unwrap();
        assert_eq!(store.get("cart").await.unwrap().as_deref(), Some("[]"));

        store.remove("cart").await.unwrap();
        store.remove("cart").await.unwrap();
        assert_eq!(store.get("cart").await.unwrap(), None);
    }
}
