//! Data layer for configuration, provider metadata, session and temporary data
//!
//! A [`Store`] is a plain string key-value backend. [`DataLayer`] sits on top
//! of it and keeps four JSON records per authentication context, each keyed
//! by the context's instance identity so several contexts can share a store.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::discovery::OidcProviderMetadata;
use crate::auth::session::SessionData;
use crate::config::{AuthClientConfig, ConfigUpdate};
use crate::error::{AuthError, Result};

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// String key-value backend behind a [`DataLayer`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get_data(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set_data(&self, key: &str, value: String) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove_data(&self, key: &str) -> Result<()>;
}

/// Record families kept per instance.
#[derive(Debug, Clone, Copy)]
enum Record {
    Config,
    ProviderMetadata,
    Session,
    Temporary,
}

impl Record {
    fn prefix(self) -> &'static str {
        match self {
            Record::Config => "config_data",
            Record::ProviderMetadata => "oidc_provider_meta_data",
            Record::Session => "session_data",
            Record::Temporary => "temporary_data",
        }
    }
}

/// Typed access to the records of one authentication context.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use oidc_auth::storage::{DataLayer, MemoryStore};
///
/// # tokio_test::block_on(async {
/// let data = DataLayer::new(Arc::new(MemoryStore::new()), "ctx-1");
/// data.set_temporary_data_parameter("flag", true.into()).await.unwrap();
/// assert_eq!(
///     data.get_temporary_data_parameter("flag").await.unwrap(),
///     Some(serde_json::Value::Bool(true))
/// );
/// # });
/// ```
#[derive(Clone)]
pub struct DataLayer {
    store: Arc<dyn Store>,
    id: String,
}

impl std::fmt::Debug for DataLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLayer").field("id", &self.id).finish()
    }
}

impl DataLayer {
    /// Creates a data layer for instance `id` over `store`.
    pub fn new(store: Arc<dyn Store>, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
        }
    }

    /// Instance identity used to key every record.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn key(&self, record: Record) -> String {
        format!("{}-{}", record.prefix(), self.id)
    }

    async fn read<T: DeserializeOwned>(&self, record: Record) -> Result<Option<T>> {
        match self.store.get_data(&self.key(record)).await? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                AuthError::Storage(format!("corrupt {} record: {}", record.prefix(), e))
            }),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, record: Record, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set_data(&self.key(record), raw).await
    }

    async fn read_object(&self, record: Record) -> Result<Map<String, Value>> {
        Ok(self.read(record).await?.unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Returns the stored configuration, if any.
    pub async fn get_config_data(&self) -> Result<Option<AuthClientConfig>> {
        self.read(Record::Config).await
    }

    /// Replaces the stored configuration.
    pub async fn set_config_data(&self, config: &AuthClientConfig) -> Result<()> {
        self.write(Record::Config, config).await
    }

    /// Applies `update` to the stored configuration and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if no configuration has been stored or
    /// the updated configuration is invalid; nothing is written then.
    pub async fn update_config_data(&self, update: &ConfigUpdate) -> Result<AuthClientConfig> {
        let mut config = self
            .get_config_data()
            .await?
            .ok_or_else(|| AuthError::Config("no configuration stored".to_string()))?;
        config.apply(update);
        config.validate()?;
        self.set_config_data(&config).await?;
        Ok(config)
    }

    // -----------------------------------------------------------------------
    // Provider metadata
    // -----------------------------------------------------------------------

    /// Returns the cached provider metadata, empty if none is cached.
    pub async fn get_oidc_provider_metadata(&self) -> Result<OidcProviderMetadata> {
        Ok(self
            .read(Record::ProviderMetadata)
            .await?
            .unwrap_or_default())
    }

    /// Replaces the cached provider metadata.
    pub async fn set_oidc_provider_metadata(&self, metadata: &OidcProviderMetadata) -> Result<()> {
        self.write(Record::ProviderMetadata, metadata).await
    }

    /// Returns one non-blank metadata field.
    pub async fn get_oidc_provider_metadata_parameter(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .get_oidc_provider_metadata()
            .await?
            .get(name)
            .map(str::to_string))
    }

    // -----------------------------------------------------------------------
    // Session data
    // -----------------------------------------------------------------------

    /// Returns the stored session, empty if none exists.
    pub async fn get_session_data(&self) -> Result<SessionData> {
        Ok(self.read(Record::Session).await?.unwrap_or_default())
    }

    /// Merges `session` into the stored session.
    ///
    /// Fields that serialize as absent or `null` keep their stored values.
    pub async fn set_session_data(&self, session: &SessionData) -> Result<()> {
        let mut stored = self.read_object(Record::Session).await?;
        if let Value::Object(incoming) = serde_json::to_value(session)? {
            for (key, value) in incoming {
                if !value.is_null() {
                    stored.insert(key, value);
                }
            }
        }
        self.write(Record::Session, &stored).await
    }

    /// Sets a single session field.
    pub async fn set_session_data_parameter(&self, key: &str, value: Value) -> Result<()> {
        let mut stored = self.read_object(Record::Session).await?;
        stored.insert(key.to_string(), value);
        self.write(Record::Session, &stored).await
    }

    /// Deletes the stored session.
    pub async fn remove_session_data(&self) -> Result<()> {
        self.store.remove_data(&self.key(Record::Session)).await
    }

    // -----------------------------------------------------------------------
    // Temporary data
    // -----------------------------------------------------------------------

    /// Returns one temporary value.
    pub async fn get_temporary_data_parameter(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_object(Record::Temporary).await?.remove(key))
    }

    /// Sets one temporary value, overwriting any previous value.
    pub async fn set_temporary_data_parameter(&self, key: &str, value: Value) -> Result<()> {
        let mut stored = self.read_object(Record::Temporary).await?;
        stored.insert(key.to_string(), value);
        self.write(Record::Temporary, &stored).await
    }

    /// Removes one temporary value.
    pub async fn remove_temporary_data_parameter(&self, key: &str) -> Result<()> {
        let mut stored = self.read_object(Record::Temporary).await?;
        if stored.remove(key).is_some() {
            self.write(Record::Temporary, &stored).await?;
        }
        Ok(())
    }
}
