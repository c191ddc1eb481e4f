//! Persistent [`Store`] backed by an embedded `sled` database
//!
//! Every write is flushed before returning so that state written by one
//! process invocation is visible to the next.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::ProjectDirs;
use sled::Db;

use super::Store;
use crate::error::{AuthError, Result};

/// Database directory name under the platform data directory.
const DEFAULT_DB_NAME: &str = "state.db";

/// Store persisted with `sled`.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use oidc_auth::storage::SledStore;
    ///
    /// # fn main() -> oidc_auth::error::Result<()> {
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SledStore::new(dir.path().join("state.db"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| AuthError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }

    /// Opens the store at [`SledStore::default_path`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the data directory cannot be
    /// determined or created, or the database cannot be opened
    pub fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }
        Self::new(path)
    }

    /// Default database location inside the user's data directory.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "oidc-auth", "oidc-auth")
            .ok_or_else(|| AuthError::Storage("Could not determine data directory".into()))?;
        Ok(dirs.data_dir().join(DEFAULT_DB_NAME))
    }
}

#[async_trait]
impl Store for SledStore {
    async fn get_data(&self, key: &str) -> Result<Option<String>> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Get failed: {}", e)))?
        {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| AuthError::Storage(format!("Value is not UTF-8: {}", e))),
            None => Ok(None),
        }
    }

    async fn set_data(&self, key: &str, value: String) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.into_bytes())
            .map_err(|e| AuthError::Storage(format!("Insert failed: {}", e)))?;
        self.flush().await
    }

    async fn remove_data(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Remove failed: {}", e)))?;
        self.flush().await
    }
}

impl SledStore {
    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AuthError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}
