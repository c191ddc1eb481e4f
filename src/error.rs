//! Error types for oidc-auth
//!
//! Every public library operation returns [`Result`], surfacing exactly one
//! [`AuthError`] on failure. Errors fall into the coarse groups described by
//! [`ErrorKind`], which lets callers decide whether a failure is a
//! precondition they can fix, a provider outage, or a bad token.

use std::fmt;

use thiserror::Error;

/// A required value that was absent when building a sign-out request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// The provider metadata has no `end_session_endpoint`.
    EndSessionEndpoint,
    /// No ID token is stored in the session.
    IdToken,
    /// Neither a sign-out nor a sign-in redirect URL is configured.
    SignOutCallbackUrl,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Missing::EndSessionEndpoint => "end session endpoint",
            Missing::IdToken => "ID token",
            Missing::SignOutCallbackUrl => "sign-out callback URL",
        };
        f.write_str(name)
    }
}

/// Coarse classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller-fixable precondition: missing endpoint, token or credential.
    Configuration,
    /// Transport failure or unexpected HTTP status from the provider.
    Network,
    /// ID token decoding or verification failure.
    Validation,
    /// The data layer failed to read or write.
    Storage,
}

/// Main error type for authentication operations
#[derive(Error, Debug)]
pub enum AuthError {
    /// The named endpoint is absent or blank in the provider metadata
    #[error("{endpoint} not found in the provider metadata")]
    EndpointNotFound {
        /// Metadata field name, e.g. `token_endpoint`
        endpoint: &'static str,
    },

    /// A refresh was requested but the session holds no refresh token
    #[error("no refresh token is stored in the session")]
    MissingRefreshToken,

    /// A value required to build the sign-out URL is missing
    #[error("{0} not found")]
    NotFound(Missing),

    /// The operation requires an authenticated session
    #[error("the user is not authenticated")]
    NotAuthenticated,

    /// Configuration is invalid or absent
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request did not complete or the provider rejected it
    #[error("network request failed: {message}")]
    NetworkRequest {
        /// Human-readable summary
        message: String,
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// OAuth `error` code from the response body, when present
        code: Option<String>,
        /// Raw response body, when present
        body: Option<String>,
    },

    /// The provider answered with a status other than the expected success
    #[error("invalid response from the provider: status {status}")]
    InvalidResponse {
        /// HTTP status received
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A response was received but could not be turned into a session
    #[error("authentication failed: {message}")]
    Authentication {
        /// Which step failed
        message: String,
        /// The original cause
        #[source]
        source: Box<AuthError>,
    },

    /// The ID token is structurally malformed
    #[error("failed to decode ID token: {0}")]
    TokenDecoding(String),

    /// No JSON Web Key matches the token's `kid`
    #[error("no signing key matches kid {kid:?}; candidates: {candidates:?}")]
    KeyNotFound {
        /// `kid` from the token header
        kid: Option<String>,
        /// `kid` values present in the key set
        candidates: Vec<String>,
    },

    /// The ID token failed signature or claim verification
    #[error("ID token validation failed: {message}")]
    TokenValidation {
        /// Summary of the failed check
        message: String,
        /// Underlying verification error
        #[source]
        source: Option<jsonwebtoken::errors::Error>,
    },

    /// Data layer errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// Wraps a failure that happened after a response was received.
    pub fn authentication(message: impl Into<String>, source: AuthError) -> Self {
        AuthError::Authentication {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Builds a transport failure with no response attached.
    pub fn network(message: impl Into<String>) -> Self {
        AuthError::NetworkRequest {
            message: message.into(),
            status: None,
            code: None,
            body: None,
        }
    }

    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::EndpointNotFound { .. }
            | AuthError::MissingRefreshToken
            | AuthError::NotFound(_)
            | AuthError::NotAuthenticated
            | AuthError::Config(_) => ErrorKind::Configuration,
            AuthError::NetworkRequest { .. } | AuthError::InvalidResponse { .. } => {
                ErrorKind::Network
            }
            AuthError::Authentication { source, .. } => source.kind(),
            AuthError::TokenDecoding(_)
            | AuthError::KeyNotFound { .. }
            | AuthError::TokenValidation { .. } => ErrorKind::Validation,
            AuthError::Storage(_) | AuthError::Serialization(_) => ErrorKind::Storage,
        }
    }
}

/// Result type alias for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;
