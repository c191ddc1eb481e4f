//! OpenID Connect provider metadata discovery and fallback
//!
//! Metadata is resolved once per authentication context. Discovery fetches
//! the well-known document; when that fails, or when the configuration asks
//! to bypass it, a deterministic set of endpoints is derived from the
//! configured base URL instead. Explicit endpoint overrides from the
//! configuration always win.
//!
//! # References
//!
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};
use crate::transport::HttpClient;

/// Default path of the discovery document relative to the base URL.
pub const DEFAULT_WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

const BASE_URL_TAG: &str = "{base_url}";

/// Endpoint templates used when discovery is unavailable.
const FALLBACK_TEMPLATES: [(&str, &str); 10] = [
    ("issuer", "{base_url}/oauth2/token"),
    ("authorization_endpoint", "{base_url}/oauth2/authorize"),
    ("token_endpoint", "{base_url}/oauth2/token"),
    ("revocation_endpoint", "{base_url}/oauth2/revoke"),
    ("end_session_endpoint", "{base_url}/oidc/logout"),
    ("jwks_uri", "{base_url}/oauth2/jwks"),
    ("userinfo_endpoint", "{base_url}/oauth2/userinfo"),
    ("introspection_endpoint", "{base_url}/oauth2/introspect"),
    ("registration_endpoint", "{base_url}/oauth2/register"),
    ("check_session_iframe", "{base_url}/oidc/checksession"),
];

// ---------------------------------------------------------------------------
// OidcProviderMetadata
// ---------------------------------------------------------------------------

/// Provider metadata as published by OIDC discovery.
///
/// Every endpoint is optional; a missing endpoint is reported as
/// [`AuthError::EndpointNotFound`] by the operation that needs it. The same
/// type describes explicit endpoint overrides in the configuration.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::discovery::OidcProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://op.example.com",
///     "token_endpoint": "https://op.example.com/token",
///     "grant_types_supported": ["authorization_code"]
/// }"#;
///
/// let meta: OidcProviderMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.get("token_endpoint"), Some("https://op.example.com/token"));
/// assert!(meta.extra.contains_key("grant_types_supported"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OidcProviderMetadata {
    /// Issuer identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Authorization endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    /// Token revocation endpoint (RFC 7009)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    /// RP-initiated logout endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    /// JSON Web Key Set document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    /// UserInfo endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    /// Token introspection endpoint (RFC 7662)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
    /// Dynamic client registration endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    /// Session management iframe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_session_iframe: Option<String>,
    /// Additional metadata fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl OidcProviderMetadata {
    fn slot(&self, name: &str) -> Option<&Option<String>> {
        Some(match name {
            "issuer" => &self.issuer,
            "authorization_endpoint" => &self.authorization_endpoint,
            "token_endpoint" => &self.token_endpoint,
            "revocation_endpoint" => &self.revocation_endpoint,
            "end_session_endpoint" => &self.end_session_endpoint,
            "jwks_uri" => &self.jwks_uri,
            "userinfo_endpoint" => &self.userinfo_endpoint,
            "introspection_endpoint" => &self.introspection_endpoint,
            "registration_endpoint" => &self.registration_endpoint,
            "check_session_iframe" => &self.check_session_iframe,
            _ => return None,
        })
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        Some(match name {
            "issuer" => &mut self.issuer,
            "authorization_endpoint" => &mut self.authorization_endpoint,
            "token_endpoint" => &mut self.token_endpoint,
            "revocation_endpoint" => &mut self.revocation_endpoint,
            "end_session_endpoint" => &mut self.end_session_endpoint,
            "jwks_uri" => &mut self.jwks_uri,
            "userinfo_endpoint" => &mut self.userinfo_endpoint,
            "introspection_endpoint" => &mut self.introspection_endpoint,
            "registration_endpoint" => &mut self.registration_endpoint,
            "check_session_iframe" => &mut self.check_session_iframe,
            _ => return None,
        })
    }

    /// Returns a named field, treating blank values as absent.
    ///
    /// Unknown names are looked up in [`extra`](Self::extra) when they hold
    /// a string.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match self.slot(name) {
            Some(slot) => slot.as_deref(),
            None => self.extra.get(name).and_then(|v| v.as_str()),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Returns `true` when no endpoint field carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        FALLBACK_TEMPLATES
            .iter()
            .all(|(name, _)| self.get(name).is_none())
    }

    /// Copies every non-blank field of `overrides` over this metadata.
    pub fn apply_overrides(&mut self, overrides: &OidcProviderMetadata) {
        for (name, _) in FALLBACK_TEMPLATES {
            if let Some(value) = overrides.get(name) {
                if let Some(slot) = self.slot_mut(name) {
                    *slot = Some(value.to_string());
                }
            }
        }
        for (key, value) in &overrides.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataState
// ---------------------------------------------------------------------------

/// How the cached provider metadata was obtained.
///
/// Callers see the same successful outcome for `Discovered` and `Fallback`;
/// the distinction is kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataState {
    /// No resolution has completed
    #[default]
    Uninitialized,
    /// Fetched from the well-known document
    Discovered,
    /// Derived from the base URL and explicit overrides
    Fallback,
}

// ---------------------------------------------------------------------------
// Discovery helpers
// ---------------------------------------------------------------------------

/// Builds the discovery URL from the base URL and the configured well-known
/// endpoint.
///
/// An absolute `well_known` is used as-is; otherwise it is appended to
/// `base_url` as a path.
///
/// # Errors
///
/// Returns [`AuthError::Config`] if the resulting URL cannot be parsed.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::discovery::well_known_url;
///
/// let url = well_known_url("https://op.example.com/t/acme/", "/.well-known/openid-configuration")
///     .unwrap();
/// assert_eq!(url.as_str(), "https://op.example.com/t/acme/.well-known/openid-configuration");
/// ```
pub fn well_known_url(base_url: &str, well_known: &str) -> Result<Url> {
    if let Ok(absolute) = Url::parse(well_known) {
        return Ok(absolute);
    }

    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        well_known.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|e| AuthError::Config(format!("invalid well-known endpoint URL {joined}: {e}")))
}

/// Derives the fallback endpoint set for `base_url`.
///
/// Each endpoint is a fixed path appended to the base URL with any trailing
/// slash removed. A blank base URL yields empty metadata.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::discovery::fallback_metadata;
///
/// let meta = fallback_metadata("https://op.example.com/");
/// assert_eq!(meta.get("token_endpoint"), Some("https://op.example.com/oauth2/token"));
/// assert_eq!(meta.get("end_session_endpoint"), Some("https://op.example.com/oidc/logout"));
/// ```
pub fn fallback_metadata(base_url: &str) -> OidcProviderMetadata {
    let base = base_url.trim().trim_end_matches('/');
    let mut metadata = OidcProviderMetadata::default();
    if base.is_empty() {
        return metadata;
    }

    for (name, template) in FALLBACK_TEMPLATES {
        if let Some(slot) = metadata.slot_mut(name) {
            *slot = Some(template.replace(BASE_URL_TAG, base));
        }
    }
    metadata
}

/// Fetches the discovery document at `url`.
///
/// Only an exact `200 OK` with a JSON object body counts as success.
///
/// # Errors
///
/// Returns [`AuthError::NetworkRequest`] on transport failure,
/// [`AuthError::InvalidResponse`] for any other status, and
/// [`AuthError::InvalidResponse`] for a body that is not metadata.
pub async fn fetch_provider_metadata(http: &HttpClient, url: &Url) -> Result<OidcProviderMetadata> {
    let response = http.get(url.as_str()).await?;
    if response.status != 200 {
        return Err(AuthError::InvalidResponse {
            status: response.status,
            body: response.body,
        });
    }
    response.json()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
