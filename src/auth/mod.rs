//! OAuth2 authorization code + PKCE client for OpenID Connect providers
//!
//! - [`engine`]: the orchestrating [`AuthenticationEngine`](engine::AuthenticationEngine)
//! - [`discovery`]: provider metadata discovery and fallback endpoints
//! - [`pkce`]: code verifier and S256 challenge generation
//! - [`id_token`]: ID token decoding and JWKS verification
//! - [`session`]: session records and token responses
//! - [`template`]: placeholder substitution for custom grant bodies

pub mod discovery;
pub mod engine;
pub mod id_token;
pub mod pkce;
pub mod session;
pub mod template;

pub use discovery::{MetadataState, OidcProviderMetadata};
pub use engine::{AuthenticationEngine, CustomGrantConfig, CustomGrantResponse, EngineBuilder};
pub use id_token::{decode_id_token, verify_id_token, IdTokenPayload, IdTokenValidation};
pub use pkce::{OsRandomSource, PkceChallenge, RandomSource};
pub use session::{BasicUserInfo, SessionData};
