//! In-process [`Store`] backed by a hash map

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Store;
use crate::error::Result;

/// Volatile store for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_data(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_data(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_data(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get_data("k").await.unwrap(), None);
        store.set_data("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get_data("k").await.unwrap().as_deref(), Some("v"));
        store.remove_data("k").await.unwrap();
        store.remove_data("k").await.unwrap();
        assert_eq!(store.get_data("k").await.unwrap(), None);
    }
}
