//! Authentication engine
//!
//! [`AuthenticationEngine`] drives the authorization code flow against one
//! provider for one authentication context. It builds authorization URLs,
//! exchanges codes, refreshes and revokes tokens, runs custom grants and
//! resolves provider metadata. All state lives in the context's
//! [`DataLayer`]; the engine itself only caches the configuration.
//!
//! Operations that need an endpoint read it from cached metadata. Call
//! [`AuthenticationEngine::get_oidc_provider_metadata`] once before using
//! them.
//!
//! # Examples
//!
//! ```no_run
//! use oidc_auth::{AuthClientConfig, AuthenticationEngine};
//!
//! # async fn example() -> oidc_auth::error::Result<()> {
//! let config = AuthClientConfig::new(
//!     "my-app",
//!     "https://op.example.com",
//!     "https://app.example.com/callback",
//! );
//! let engine = AuthenticationEngine::builder(config).build().await?;
//! engine.get_oidc_provider_metadata(false).await?;
//!
//! let url = engine.build_authorization_url([("state", "xyz")]).await?;
//! println!("visit {url}");
//! // ...redirect comes back with ?code=...
//! let session = engine.exchange_authorization_code("the-code", None).await?;
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use serde_json::Value;
use url::Url;

use crate::auth::discovery::{
    fallback_metadata, fetch_provider_metadata, well_known_url, MetadataState,
    OidcProviderMetadata,
};
use crate::auth::id_token::{decode_id_token, verify_id_token, IdTokenPayload, IdTokenValidation};
use crate::auth::pkce::{OsRandomSource, PkceChallenge, RandomSource, CODE_CHALLENGE_METHOD};
use crate::auth::session::{
    BasicUserInfo, SessionData, TokenResponse, METADATA_STATE_KEY, OP_CONFIG_INITIATED_KEY,
    PKCE_CODE_VERIFIER_KEY,
};
use crate::auth::template::{substitute_template_tags, TemplateContext};
use crate::config::{AuthClientConfig, ConfigUpdate};
use crate::error::{AuthError, Missing, Result};
use crate::storage::{DataLayer, MemoryStore, Store};
use crate::transport::{HttpClient, HttpResponse};

/// `state` value sent with every sign-out request.
pub const SIGN_OUT_SUCCESS_STATE: &str = "sign_out_success";

// ---------------------------------------------------------------------------
// Custom grants
// ---------------------------------------------------------------------------

/// A provider-specific token request.
///
/// Every value in [`data`](Self::data) is passed through
/// [`substitute_template_tags`] before being form-encoded.
#[derive(Debug, Clone, Default)]
pub struct CustomGrantConfig {
    /// Caller-chosen identifier, used only in logs
    pub id: String,
    /// Endpoint to POST to; the token endpoint when `None`
    pub token_endpoint: Option<String>,
    /// Form fields, values may contain template tags
    pub data: BTreeMap<String, String>,
    /// Send the current access token as a bearer token
    pub attach_token: bool,
    /// Treat the response as a token response and store it as the session
    pub returns_session: bool,
    /// Refuse to run without an authenticated session
    pub sign_in_required: bool,
}

/// Result of [`AuthenticationEngine::request_custom_grant`].
#[derive(Debug, Clone, PartialEq)]
pub enum CustomGrantResponse {
    /// The stored session after materializing a token response
    Session(SessionData),
    /// The untouched provider response
    Raw(HttpResponse),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`AuthenticationEngine`].
pub struct EngineBuilder {
    config: AuthClientConfig,
    store: Option<Arc<dyn Store>>,
    instance_id: Option<String>,
    random: Option<Arc<dyn RandomSource>>,
}

impl EngineBuilder {
    /// Uses `store` for all state. Defaults to a fresh [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Identity keying this context's records. Defaults to a random UUID.
    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Source of PKCE randomness. Defaults to [`OsRandomSource`].
    pub fn random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Validates the configuration, creates the HTTP client and persists the
    /// configuration.
    ///
    /// Cached provider metadata is invalidated when the stored configuration
    /// for this instance points at a different metadata source.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] for invalid configuration and
    /// storage errors from persisting it.
    pub async fn build(self) -> Result<AuthenticationEngine> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let id = self
            .instance_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let random = self
            .random
            .unwrap_or_else(|| Arc::new(OsRandomSource) as Arc<dyn RandomSource>);

        let http = HttpClient::from_config(&self.config)?;
        let data = DataLayer::new(store, id);

        if let Some(stored) = data.get_config_data().await? {
            if !stored.same_metadata_source(&self.config) {
                tracing::info!(
                    instance = %data.id(),
                    "Provider settings changed; cached metadata will be resolved again"
                );
                data.remove_temporary_data_parameter(OP_CONFIG_INITIATED_KEY)
                    .await?;
                data.remove_temporary_data_parameter(METADATA_STATE_KEY)
                    .await?;
            }
        }
        data.set_config_data(&self.config).await?;

        tracing::debug!(instance = %data.id(), "Authentication engine created");
        Ok(AuthenticationEngine {
            config: self.config,
            data,
            http,
            random,
        })
    }
}

// ---------------------------------------------------------------------------
// AuthenticationEngine
// ---------------------------------------------------------------------------

/// OAuth2 authorization code + PKCE client for one authentication context.
pub struct AuthenticationEngine {
    config: AuthClientConfig,
    data: DataLayer,
    http: HttpClient,
    random: Arc<dyn RandomSource>,
}

fn field(name: &str, value: impl Into<String>) -> (String, String) {
    (name.to_string(), value.into())
}

impl AuthenticationEngine {
    /// Starts building an engine for `config`.
    pub fn builder(config: AuthClientConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            store: None,
            instance_id: None,
            random: None,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &AuthClientConfig {
        &self.config
    }

    /// Data layer holding this context's state.
    pub fn data_layer(&self) -> &DataLayer {
        &self.data
    }

    /// Identity of this context.
    pub fn instance_id(&self) -> &str {
        self.data.id()
    }

    async fn endpoint(&self, name: &'static str) -> Result<String> {
        self.data
            .get_oidc_provider_metadata_parameter(name)
            .await?
            .ok_or(AuthError::EndpointNotFound { endpoint: name })
    }

    // -----------------------------------------------------------------------
    // Authorization request
    // -----------------------------------------------------------------------

    /// Builds the authorization URL the user agent should be sent to.
    ///
    /// When PKCE is enabled a fresh verifier is generated and stored,
    /// replacing any unconsumed one. Extra parameters are appended last;
    /// entries with an empty key or value are skipped.
    ///
    /// # Errors
    ///
    /// - [`AuthError::EndpointNotFound`] without an authorization endpoint.
    /// - [`AuthError::Config`] if the endpoint is not a valid URL.
    /// - Storage and randomness failures while persisting the verifier.
    pub async fn build_authorization_url<I, K, V>(&self, extra_params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let endpoint = self.endpoint("authorization_endpoint").await?;
        let mut url = Url::parse(&endpoint).map_err(|e| {
            AuthError::Config(format!("invalid authorization endpoint URL {endpoint}: {e}"))
        })?;

        let pkce = if self.config.enable_pkce {
            let challenge = PkceChallenge::generate(&*self.random)?;
            self.data
                .set_temporary_data_parameter(
                    PKCE_CODE_VERIFIER_KEY,
                    Value::String(challenge.verifier.clone()),
                )
                .await?;
            Some(challenge)
        } else {
            None
        };

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("scope", &self.config.computed_scope().join(" "));
            query.append_pair("redirect_uri", &self.config.sign_in_redirect_url);
            if let Some(mode) = self.config.response_mode {
                query.append_pair("response_mode", mode.as_str());
            }
            if let Some(challenge) = &pkce {
                query.append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
                query.append_pair("code_challenge", &challenge.challenge);
            }
            if let Some(prompt) = self.config.prompt.as_deref().filter(|p| !p.is_empty()) {
                query.append_pair("prompt", prompt);
            }
            for (key, value) in extra_params {
                let value = value.to_string();
                if !key.as_ref().is_empty() && !value.is_empty() {
                    query.append_pair(key.as_ref(), &value);
                }
            }
        }

        tracing::debug!(
            instance = %self.instance_id(),
            pkce = pkce.is_some(),
            "Built authorization URL"
        );
        Ok(url.to_string())
    }

    // -----------------------------------------------------------------------
    // Token lifecycle
    // -----------------------------------------------------------------------

    /// Exchanges an authorization code for tokens and stores the session.
    ///
    /// `session_state` is stored before the request is sent. The stored PKCE
    /// verifier is consumed; a failed exchange needs a new authorization
    /// request.
    ///
    /// # Errors
    ///
    /// - [`AuthError::EndpointNotFound`] without a token endpoint.
    /// - [`AuthError::NetworkRequest`] on transport failure or non-2xx status.
    /// - [`AuthError::Authentication`] if the response cannot be stored as a
    ///   session.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        session_state: Option<&str>,
    ) -> Result<SessionData> {
        let token_endpoint = self.endpoint("token_endpoint").await?;

        if let Some(state) = session_state {
            self.data
                .set_session_data_parameter("session_state", Value::from(state))
                .await?;
        }

        let mut form = vec![field("client_id", self.config.client_id.as_str())];
        if let Some(secret) = self.config.client_secret() {
            form.push(field("client_secret", secret));
        }
        form.push(field("code", code));
        form.push(field("grant_type", "authorization_code"));
        form.push(field("redirect_uri", self.config.sign_in_redirect_url.as_str()));

        if self.config.enable_pkce {
            let verifier = self
                .data
                .get_temporary_data_parameter(PKCE_CODE_VERIFIER_KEY)
                .await?
                .and_then(|v| v.as_str().map(str::to_string));
            match verifier {
                Some(verifier) => {
                    self.data
                        .remove_temporary_data_parameter(PKCE_CODE_VERIFIER_KEY)
                        .await?;
                    form.push(field("code_verifier", verifier));
                }
                None => {
                    tracing::warn!(
                        instance = %self.instance_id(),
                        "No PKCE code verifier stored; exchanging code without one"
                    );
                }
            }
        }

        let response = self.http.post_form(&token_endpoint, &form, None).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, "Authorization code exchange rejected");
            return Err(response.into_network_error("authorization code exchange failed"));
        }

        let session = self
            .materialize_session(&response)
            .await
            .map_err(|e| AuthError::authentication("failed to process token response", e))?;
        tracing::info!(instance = %self.instance_id(), "Authorization code exchanged");
        Ok(session)
    }

    /// Uses the stored refresh token to obtain new tokens.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingRefreshToken`] when the session has none; no
    ///   request is made.
    /// - [`AuthError::EndpointNotFound`] without a token endpoint.
    /// - [`AuthError::NetworkRequest`] and [`AuthError::Authentication`] as
    ///   for [`exchange_authorization_code`](Self::exchange_authorization_code).
    pub async fn refresh_access_token(&self) -> Result<SessionData> {
        let refresh_token = self
            .data
            .get_session_data()
            .await?
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;
        let token_endpoint = self.endpoint("token_endpoint").await?;

        let mut form = vec![
            field("client_id", self.config.client_id.as_str()),
            field("refresh_token", refresh_token),
            field("grant_type", "refresh_token"),
        ];
        if let Some(secret) = self.config.client_secret() {
            form.push(field("client_secret", secret));
        }

        let response = self.http.post_form(&token_endpoint, &form, None).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, "Token refresh rejected");
            return Err(response.into_network_error("token refresh failed"));
        }

        let session = self
            .materialize_session(&response)
            .await
            .map_err(|e| AuthError::authentication("failed to process refresh response", e))?;
        tracing::info!(instance = %self.instance_id(), "Access token refreshed");
        Ok(session)
    }

    /// Revokes the current access token and clears the session.
    ///
    /// # Errors
    ///
    /// - [`AuthError::EndpointNotFound`] without a revocation endpoint.
    /// - [`AuthError::NetworkRequest`] on transport failure.
    /// - [`AuthError::InvalidResponse`] for any status other than 200; the
    ///   session is left untouched.
    pub async fn revoke_access_token(&self) -> Result<HttpResponse> {
        let endpoint = self.endpoint("revocation_endpoint").await?;
        let session = self.data.get_session_data().await?;

        let form = vec![
            field("client_id", self.config.client_id.as_str()),
            field("token", session.access_token),
            field("token_type_hint", "access_token"),
        ];

        let response = self.http.post_form(&endpoint, &form, None).await?;
        if response.status != 200 {
            tracing::warn!(status = response.status, "Token revocation rejected");
            return Err(AuthError::InvalidResponse {
                status: response.status,
                body: response.body,
            });
        }

        self.data.remove_session_data().await?;
        tracing::info!(instance = %self.instance_id(), "Access token revoked");
        Ok(response)
    }

    /// Sends a custom grant request.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] when `sign_in_required` or
    ///   `attach_token` is set and no access token is stored.
    /// - [`AuthError::EndpointNotFound`] with no override and no token
    ///   endpoint.
    /// - [`AuthError::NetworkRequest`] on transport failure.
    /// - [`AuthError::InvalidResponse`] for any status other than 200.
    /// - [`AuthError::Authentication`] if a session response cannot be stored.
    pub async fn request_custom_grant(
        &self,
        grant: &CustomGrantConfig,
    ) -> Result<CustomGrantResponse> {
        let session = self.data.get_session_data().await?;
        if (grant.sign_in_required || grant.attach_token) && !session.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        let endpoint = match grant.token_endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => endpoint.to_string(),
            None => self.endpoint("token_endpoint").await?,
        };

        let context = self.template_context(&session);
        let form: Vec<(String, String)> = grant
            .data
            .iter()
            .map(|(key, template)| (key.clone(), substitute_template_tags(template, &context)))
            .collect();
        let bearer = grant
            .attach_token
            .then_some(session.access_token.as_str());

        tracing::debug!(grant = %grant.id, endpoint = %endpoint, "Sending custom grant");
        let response = self.http.post_form(&endpoint, &form, bearer).await?;
        if response.status != 200 {
            tracing::warn!(grant = %grant.id, status = response.status, "Custom grant rejected");
            return Err(AuthError::InvalidResponse {
                status: response.status,
                body: response.body,
            });
        }

        if !grant.returns_session {
            return Ok(CustomGrantResponse::Raw(response));
        }

        let session = self
            .materialize_session(&response)
            .await
            .map_err(|e| AuthError::authentication("failed to process custom grant response", e))?;
        tracing::info!(grant = %grant.id, "Custom grant stored a new session");
        Ok(CustomGrantResponse::Session(session))
    }

    fn template_context(&self, session: &SessionData) -> TemplateContext {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        let username = non_empty(session.id_token.as_str())
            .and_then(|token| decode_id_token(&token).ok())
            .and_then(|payload| payload.sub);

        TemplateContext {
            access_token: non_empty(session.access_token.as_str()),
            refresh_token: session.refresh_token.clone(),
            id_token: non_empty(session.id_token.as_str()),
            username,
            scope: non_empty(session.scope.as_str()),
            client_id: Some(self.config.client_id.clone()),
            client_secret: self.config.client_secret().map(str::to_string),
        }
    }

    async fn materialize_session(&self, response: &HttpResponse) -> Result<SessionData> {
        let token: TokenResponse = response.json()?;
        let session = SessionData::from_token_response(token, Utc::now());

        if self.config.validate_id_token && !session.id_token.is_empty() {
            self.validate_id_token(&session.id_token).await?;
        }

        self.data.set_session_data(&session).await?;
        self.data.get_session_data().await
    }

    async fn validate_id_token(&self, id_token: &str) -> Result<IdTokenPayload> {
        let jwks_uri = self.endpoint("jwks_uri").await?;
        let issuer = self.endpoint("issuer").await?;

        let response = self.http.get(&jwks_uri).await?;
        if response.status != 200 {
            return Err(AuthError::InvalidResponse {
                status: response.status,
                body: response.body,
            });
        }
        let jwks: JwkSet = response.json()?;

        let subject = decode_id_token(id_token)?.sub.unwrap_or_default();
        let validation = IdTokenValidation::new(
            self.config.client_id.as_str(),
            issuer,
            subject,
            self.config.clock_tolerance,
        );
        verify_id_token(id_token, &jwks, &validation)
    }

    // -----------------------------------------------------------------------
    // Provider metadata
    // -----------------------------------------------------------------------

    /// Resolves provider metadata and caches it.
    ///
    /// Returns immediately when metadata is already cached and `force` is
    /// false. Discovery failures are logged and replaced by fallback
    /// endpoints; the result is `Ok(true)` either way.
    ///
    /// # Errors
    ///
    /// Only storage failures are reported.
    pub async fn get_oidc_provider_metadata(&self, force: bool) -> Result<bool> {
        if !force && self.is_metadata_initiated().await? {
            tracing::debug!(instance = %self.instance_id(), "Provider metadata already resolved");
            return Ok(true);
        }

        if self.config.override_well_known_endpoint_config {
            self.resolve_from_overrides().await?;
            return Ok(true);
        }

        let (metadata, state) = match self.discover().await {
            Ok(mut metadata) => {
                metadata.apply_overrides(&self.config.endpoints);
                tracing::info!(instance = %self.instance_id(), "Provider metadata discovered");
                (metadata, MetadataState::Discovered)
            }
            Err(e) => {
                tracing::warn!(
                    instance = %self.instance_id(),
                    error = %e,
                    "Discovery failed; using fallback endpoints"
                );
                (self.override_metadata(), MetadataState::Fallback)
            }
        };

        self.store_metadata(&metadata, state).await?;
        Ok(true)
    }

    async fn discover(&self) -> Result<OidcProviderMetadata> {
        let url = well_known_url(&self.config.base_url, &self.config.well_known_endpoint)?;
        tracing::debug!(url = %url, "Fetching discovery document");
        fetch_provider_metadata(&self.http, &url).await
    }

    fn override_metadata(&self) -> OidcProviderMetadata {
        let mut metadata = fallback_metadata(&self.config.base_url);
        metadata.apply_overrides(&self.config.endpoints);
        metadata
    }

    async fn resolve_from_overrides(&self) -> Result<()> {
        tracing::debug!(instance = %self.instance_id(), "Using configured endpoints");
        self.store_metadata(&self.override_metadata(), MetadataState::Fallback)
            .await
    }

    async fn store_metadata(
        &self,
        metadata: &OidcProviderMetadata,
        state: MetadataState,
    ) -> Result<()> {
        self.data.set_oidc_provider_metadata(metadata).await?;
        self.data
            .set_temporary_data_parameter(METADATA_STATE_KEY, serde_json::to_value(state)?)
            .await?;
        self.data
            .set_temporary_data_parameter(OP_CONFIG_INITIATED_KEY, Value::Bool(true))
            .await
    }

    async fn is_metadata_initiated(&self) -> Result<bool> {
        Ok(self
            .data
            .get_temporary_data_parameter(OP_CONFIG_INITIATED_KEY)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// How the cached metadata was obtained.
    pub async fn metadata_state(&self) -> Result<MetadataState> {
        match self
            .data
            .get_temporary_data_parameter(METADATA_STATE_KEY)
            .await?
        {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(MetadataState::Uninitialized),
        }
    }

    /// Cached provider metadata.
    pub async fn get_service_endpoints(&self) -> Result<OidcProviderMetadata> {
        self.data.get_oidc_provider_metadata().await
    }

    // -----------------------------------------------------------------------
    // Sign-out
    // -----------------------------------------------------------------------

    /// Builds the RP-initiated logout URL.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] naming the missing end session endpoint, ID
    /// token or callback URL.
    pub async fn get_sign_out_url(&self) -> Result<String> {
        let endpoint = self
            .data
            .get_oidc_provider_metadata_parameter("end_session_endpoint")
            .await?
            .ok_or(AuthError::NotFound(Missing::EndSessionEndpoint))?;
        let id_token = self.get_id_token().await?;
        let callback = self
            .config
            .sign_out_callback()
            .ok_or(AuthError::NotFound(Missing::SignOutCallbackUrl))?;

        let mut url = Url::parse(&endpoint).map_err(|e| {
            AuthError::Config(format!("invalid end session endpoint URL {endpoint}: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("id_token_hint", &id_token)
            .append_pair("post_logout_redirect_uri", callback)
            .append_pair("state", SIGN_OUT_SUCCESS_STATE);
        Ok(url.to_string())
    }

    /// Builds the logout URL and clears the session.
    pub async fn sign_out(&self) -> Result<String> {
        let url = self.get_sign_out_url().await?;
        self.clear_session().await?;
        tracing::info!(instance = %self.instance_id(), "Signed out");
        Ok(url)
    }

    // -----------------------------------------------------------------------
    // Session introspection
    // -----------------------------------------------------------------------

    /// Stored session, empty when not signed in.
    pub async fn get_session_data(&self) -> Result<SessionData> {
        self.data.get_session_data().await
    }

    /// `true` when an access token is stored.
    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.data.get_session_data().await?.is_authenticated())
    }

    /// Stored access token.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] when none is stored.
    pub async fn get_access_token(&self) -> Result<String> {
        let session = self.data.get_session_data().await?;
        if session.is_authenticated() {
            Ok(session.access_token)
        } else {
            Err(AuthError::NotAuthenticated)
        }
    }

    /// Stored ID token.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] with [`Missing::IdToken`] when none is stored.
    pub async fn get_id_token(&self) -> Result<String> {
        let id_token = self.data.get_session_data().await?.id_token;
        if id_token.is_empty() {
            Err(AuthError::NotFound(Missing::IdToken))
        } else {
            Ok(id_token)
        }
    }

    /// Claims of the stored ID token, without verification.
    pub async fn get_decoded_id_token(&self) -> Result<IdTokenPayload> {
        decode_id_token(&self.get_id_token().await?)
    }

    /// User details from the stored ID token and session.
    pub async fn get_basic_user_info(&self) -> Result<BasicUserInfo> {
        let session = self.data.get_session_data().await?;
        if session.id_token.is_empty() {
            return Err(AuthError::NotFound(Missing::IdToken));
        }
        let payload = decode_id_token(&session.id_token)?;
        Ok(BasicUserInfo::from_session(&session, payload))
    }

    /// Removes all session state.
    pub async fn clear_session(&self) -> Result<()> {
        self.data.remove_session_data().await
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Applies and persists a partial configuration update.
    ///
    /// An update that turns on endpoint overrides and supplies endpoints
    /// rebuilds metadata without discovery. Any other update touching
    /// endpoints forces metadata resolution.
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] if the updated configuration is invalid; the
    /// current configuration is kept in that case.
    pub async fn update_config(&mut self, update: ConfigUpdate) -> Result<()> {
        let mut candidate = self.config.clone();
        candidate.apply(&update);
        candidate.validate()?;
        let http = if update.changes_transport() {
            Some(HttpClient::from_config(&candidate)?)
        } else {
            None
        };

        self.config = self.data.update_config_data(&update).await?;
        if let Some(http) = http {
            self.http = http;
        }
        tracing::debug!(instance = %self.instance_id(), "Configuration updated");

        if update.overrides_endpoints() {
            self.resolve_from_overrides().await?;
        } else if update.changes_endpoints() {
            self.get_oidc_provider_metadata(true).await?;
        }
        Ok(())
    }
}
