//! oidc-auth - OAuth2 authorization code + PKCE client library
//!
//! This library implements the client side of the OAuth2 authorization code
//! flow with PKCE against OpenID Connect providers: authorization URL
//! construction, code exchange, refresh, revocation, custom grants, ID token
//! decoding and verification, and provider metadata discovery with fallback.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: Authentication engine, PKCE, discovery, ID tokens and sessions
//! - `storage`: Data layer over pluggable key-value stores (memory, sled)
//! - `transport`: Per-context HTTP client
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use oidc_auth::{AuthClientConfig, AuthenticationEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AuthClientConfig::load("oidc-auth.yaml")?;
//!     let engine = AuthenticationEngine::builder(config).build().await?;
//!     engine.get_oidc_provider_metadata(false).await?;
//!     println!("{}", engine.build_authorization_url([("state", "abc")]).await?);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod storage;
pub mod transport;

// Re-export commonly used types
pub use auth::{
    AuthenticationEngine, CustomGrantConfig, CustomGrantResponse, EngineBuilder, MetadataState,
    OidcProviderMetadata, SessionData,
};
pub use config::{AuthClientConfig, ConfigUpdate, ResponseMode};
pub use error::{AuthError, ErrorKind, Result};
pub use storage::{DataLayer, MemoryStore, SledStore, Store};
