//! Configuration management for oidc-auth
//!
//! This module handles loading, parsing, validating, and updating the client
//! configuration from YAML files and environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::discovery::{OidcProviderMetadata, DEFAULT_WELL_KNOWN_PATH};
use crate::error::{AuthError, Result};

/// Scope every authorization request must carry.
pub const OPENID_SCOPE: &str = "openid";

/// How the provider returns the authorization response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Parameters in the redirect query string
    Query,
    /// Parameters POSTed to the redirect URL
    FormPost,
}

impl ResponseMode {
    /// Wire value for the `response_mode` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Query => "query",
            ResponseMode::FormPost => "form_post",
        }
    }
}

impl std::str::FromStr for ResponseMode {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "query" => Ok(ResponseMode::Query),
            "form_post" => Ok(ResponseMode::FormPost),
            other => Err(AuthError::Config(format!("Invalid response mode: {}", other))),
        }
    }
}

/// Client configuration for one authentication context
///
/// # Examples
///
/// ```
/// use oidc_auth::config::AuthClientConfig;
///
/// let yaml = r#"
/// client_id: my-app
/// base_url: https://op.example.com
/// sign_in_redirect_url: https://app.example.com/callback
/// scope: [profile]
/// "#;
/// let config: AuthClientConfig = serde_yaml::from_str(yaml).unwrap();
/// assert!(config.enable_pkce);
/// assert_eq!(config.computed_scope(), vec!["profile", "openid"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthClientConfig {
    /// OAuth client identifier
    pub client_id: String,

    /// Client secret for confidential clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Issuer base URL used for discovery and fallback endpoints
    pub base_url: String,

    /// Redirect URI registered for sign-in
    pub sign_in_redirect_url: String,

    /// Redirect URI after sign-out; sign-in redirect is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_out_redirect_url: Option<String>,

    /// Requested scopes; `openid` is added when missing
    #[serde(default)]
    pub scope: Vec<String>,

    /// Authorization response mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<ResponseMode>,

    /// `prompt` parameter for the authorization request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Send a PKCE challenge and verifier
    #[serde(default = "default_enable_pkce")]
    pub enable_pkce: bool,

    /// Keep and resend cookies set by the provider
    #[serde(default)]
    pub send_cookies_in_requests: bool,

    /// Extra PEM trust anchor for the provider's TLS certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    /// Skip discovery and build metadata from fallback plus `endpoints`
    #[serde(default)]
    pub override_well_known_endpoint_config: bool,

    /// Explicit endpoint overrides; these win over discovered values
    #[serde(default)]
    pub endpoints: OidcProviderMetadata,

    /// Discovery document path relative to `base_url`, or an absolute URL
    #[serde(default = "default_well_known_endpoint")]
    pub well_known_endpoint: String,

    /// Verify the ID token signature and claims against the provider JWKS
    #[serde(default)]
    pub validate_id_token: bool,

    /// Allowed clock skew for ID token expiry, in seconds
    #[serde(default = "default_clock_tolerance")]
    pub clock_tolerance: u64,

    /// HTTP request timeout, in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_enable_pkce() -> bool {
    true
}

fn default_well_known_endpoint() -> String {
    DEFAULT_WELL_KNOWN_PATH.to_string()
}

fn default_clock_tolerance() -> u64 {
    300
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl AuthClientConfig {
    /// Creates a configuration with defaults for every optional field.
    pub fn new(
        client_id: impl Into<String>,
        base_url: impl Into<String>,
        sign_in_redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            base_url: base_url.into(),
            sign_in_redirect_url: sign_in_redirect_url.into(),
            sign_out_redirect_url: None,
            scope: Vec::new(),
            response_mode: None,
            prompt: None,
            enable_pkce: default_enable_pkce(),
            send_cookies_in_requests: false,
            certificate: None,
            override_well_known_endpoint_config: false,
            endpoints: OidcProviderMetadata::default(),
            well_known_endpoint: default_well_known_endpoint(),
            validate_id_token: false,
            clock_tolerance: default_clock_tolerance(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path.as_ref())?;
        config.apply_env_vars();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AuthError::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_vars(&mut self) {
        if let Ok(client_id) = std::env::var("OIDC_AUTH_CLIENT_ID") {
            self.client_id = client_id;
            tracing::debug!("Env override: OIDC_AUTH_CLIENT_ID");
        }

        if let Ok(secret) = std::env::var("OIDC_AUTH_CLIENT_SECRET") {
            self.client_secret = Some(secret);
            tracing::debug!("Env override: OIDC_AUTH_CLIENT_SECRET");
        }

        if let Ok(base_url) = std::env::var("OIDC_AUTH_BASE_URL") {
            tracing::debug!(base_url = %base_url, "Env override: OIDC_AUTH_BASE_URL");
            self.base_url = base_url;
        }

        if let Ok(url) = std::env::var("OIDC_AUTH_SIGN_IN_REDIRECT_URL") {
            tracing::debug!(url = %url, "Env override: OIDC_AUTH_SIGN_IN_REDIRECT_URL");
            self.sign_in_redirect_url = url;
        }

        if let Ok(url) = std::env::var("OIDC_AUTH_SIGN_OUT_REDIRECT_URL") {
            tracing::debug!(url = %url, "Env override: OIDC_AUTH_SIGN_OUT_REDIRECT_URL");
            self.sign_out_redirect_url = Some(url);
        }

        if let Ok(scope) = std::env::var("OIDC_AUTH_SCOPE") {
            let scopes: Vec<String> = scope
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if scopes.is_empty() {
                tracing::warn!("Invalid value for OIDC_AUTH_SCOPE: {:?}", scope);
            } else {
                tracing::debug!(scope = ?scopes, "Env override: OIDC_AUTH_SCOPE");
                self.scope = scopes;
            }
        }

        if let Ok(enable_pkce) = std::env::var("OIDC_AUTH_ENABLE_PKCE") {
            match enable_pkce.parse::<bool>() {
                Ok(v) => {
                    self.enable_pkce = v;
                    tracing::debug!(enable_pkce = v, "Env override: OIDC_AUTH_ENABLE_PKCE");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for OIDC_AUTH_ENABLE_PKCE: {}", enable_pkce);
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::Config("client_id cannot be empty".to_string()));
        }

        Url::parse(&self.base_url)
            .map_err(|e| AuthError::Config(format!("Invalid base_url {}: {}", self.base_url, e)))?;

        Url::parse(&self.sign_in_redirect_url).map_err(|e| {
            AuthError::Config(format!(
                "Invalid sign_in_redirect_url {}: {}",
                self.sign_in_redirect_url, e
            ))
        })?;

        if let Some(url) = self.sign_out_redirect_url.as_deref() {
            if !url.trim().is_empty() {
                Url::parse(url).map_err(|e| {
                    AuthError::Config(format!("Invalid sign_out_redirect_url {}: {}", url, e))
                })?;
            }
        }

        if self.scope.iter().any(|s| s.trim().is_empty()) {
            return Err(AuthError::Config(
                "scope entries cannot be empty".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(AuthError::Config(
                "request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Scopes to request: configured scopes in order, without duplicates,
    /// with `openid` appended when missing.
    pub fn computed_scope(&self) -> Vec<String> {
        let mut scopes: Vec<String> = Vec::with_capacity(self.scope.len() + 1);
        for scope in &self.scope {
            if !scopes.contains(scope) {
                scopes.push(scope.clone());
            }
        }
        if !scopes.iter().any(|s| s == OPENID_SCOPE) {
            scopes.push(OPENID_SCOPE.to_string());
        }
        scopes
    }

    /// Client secret, if one is configured and not blank.
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// Redirect target after sign-out: the sign-out URL, else the sign-in URL.
    pub fn sign_out_callback(&self) -> Option<&str> {
        self.sign_out_redirect_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(self.sign_in_redirect_url.as_str()).filter(|s| !s.trim().is_empty()))
    }

    /// Applies every field present in `update`.
    ///
    /// Endpoint overrides are merged field by field into the existing ones.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(v) = &update.client_id {
            self.client_id = v.clone();
        }
        if let Some(v) = &update.client_secret {
            self.client_secret = Some(v.clone());
        }
        if let Some(v) = &update.base_url {
            self.base_url = v.clone();
        }
        if let Some(v) = &update.sign_in_redirect_url {
            self.sign_in_redirect_url = v.clone();
        }
        if let Some(v) = &update.sign_out_redirect_url {
            self.sign_out_redirect_url = Some(v.clone());
        }
        if let Some(v) = &update.scope {
            self.scope = v.clone();
        }
        if let Some(v) = update.response_mode {
            self.response_mode = Some(v);
        }
        if let Some(v) = &update.prompt {
            self.prompt = Some(v.clone());
        }
        if let Some(v) = update.enable_pkce {
            self.enable_pkce = v;
        }
        if let Some(v) = update.send_cookies_in_requests {
            self.send_cookies_in_requests = v;
        }
        if let Some(v) = &update.certificate {
            self.certificate = Some(v.clone());
        }
        if let Some(v) = update.override_well_known_endpoint_config {
            self.override_well_known_endpoint_config = v;
        }
        if let Some(v) = &update.endpoints {
            self.endpoints.apply_overrides(v);
        }
        if let Some(v) = &update.well_known_endpoint {
            self.well_known_endpoint = v.clone();
        }
        if let Some(v) = update.validate_id_token {
            self.validate_id_token = v;
        }
        if let Some(v) = update.clock_tolerance {
            self.clock_tolerance = v;
        }
        if let Some(v) = update.request_timeout_seconds {
            self.request_timeout_seconds = v;
        }
    }

    /// Whether `other` resolves provider metadata from the same place.
    ///
    /// Compares the fields covered by [`ConfigUpdate::changes_endpoints`].
    pub fn same_metadata_source(&self, other: &AuthClientConfig) -> bool {
        self.base_url == other.base_url
            && self.well_known_endpoint == other.well_known_endpoint
            && self.override_well_known_endpoint_config
                == other.override_well_known_endpoint_config
            && self.endpoints == other.endpoints
    }
}

/// Partial configuration; `None` leaves the current value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub base_url: Option<String>,
    pub sign_in_redirect_url: Option<String>,
    pub sign_out_redirect_url: Option<String>,
    pub scope: Option<Vec<String>>,
    pub response_mode: Option<ResponseMode>,
    pub prompt: Option<String>,
    pub enable_pkce: Option<bool>,
    pub send_cookies_in_requests: Option<bool>,
    pub certificate: Option<String>,
    pub override_well_known_endpoint_config: Option<bool>,
    pub endpoints: Option<OidcProviderMetadata>,
    pub well_known_endpoint: Option<String>,
    pub validate_id_token: Option<bool>,
    pub clock_tolerance: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

impl ConfigUpdate {
    /// Whether the update explicitly forces metadata from overrides alone.
    pub fn overrides_endpoints(&self) -> bool {
        self.override_well_known_endpoint_config == Some(true) && self.endpoints.is_some()
    }

    /// Whether the update changes where metadata comes from.
    pub fn changes_endpoints(&self) -> bool {
        self.endpoints.is_some()
            || self.base_url.is_some()
            || self.well_known_endpoint.is_some()
            || self.override_well_known_endpoint_config.is_some()
    }

    /// Whether the update changes HTTP client settings.
    pub fn changes_transport(&self) -> bool {
        self.certificate.is_some()
            || self.send_cookies_in_requests.is_some()
            || self.request_timeout_seconds.is_some()
    }
}
