//! Session records and token response parsing

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::auth::id_token::IdTokenPayload;

/// Temporary-data key holding the PKCE code verifier.
pub const PKCE_CODE_VERIFIER_KEY: &str = "pkce_code_verifier";

/// Temporary-data key memoizing that metadata resolution completed.
pub const OP_CONFIG_INITIATED_KEY: &str = "op_config_initiated";

/// Temporary-data key recording the [`MetadataState`](crate::auth::discovery::MetadataState).
pub const METADATA_STATE_KEY: &str = "metadata_state";

/// Tokens issued to the current user.
///
/// Empty strings and `None` are omitted when serialized, which lets a partial
/// record be merged over a stored one without erasing fields it lacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id_token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_type: String,
    /// Lifetime in seconds from `created_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Space-delimited granted scope
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// When the tokens were received, epoch milliseconds
    #[serde(skip_serializing_if = "is_zero")]
    pub created_at: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl SessionData {
    /// Builds a session from a token endpoint response received at
    /// `created_at`.
    pub fn from_token_response(response: TokenResponse, created_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            id_token: response.id_token.unwrap_or_default(),
            token_type: response.token_type.unwrap_or_default(),
            expires_in: response.expires_in,
            scope: response.scope.unwrap_or_default(),
            session_state: None,
            created_at: created_at.timestamp_millis(),
        }
    }

    /// Returns `true` when an access token is present.
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Absolute expiry of the access token, if the provider reported one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let expires_in = i64::try_from(self.expires_in?).ok()?;
        let created = Utc.timestamp_millis_opt(self.created_at).single()?;
        created.checked_add_signed(Duration::seconds(expires_in))
    }

    /// Returns `true` if the access token expires within the next 60 seconds.
    ///
    /// Sessions without a known expiry never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            None => false,
            Some(expires_at) => {
                let buffer = Duration::seconds(60);
                Utc::now() >= expires_at - buffer
            }
        }
    }
}

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Some providers send this as a string
    #[serde(default, deserialize_with = "deserialize_lifetime")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn deserialize_lifetime<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lifetime {
        Seconds(u64),
        Text(String),
    }

    match Option::<Lifetime>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lifetime::Seconds(seconds)) => Ok(Some(seconds)),
        Some(Lifetime::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Lifetime::Text(text)) => text.trim().parse().map(Some).map_err(|_| {
            serde::de::Error::custom(format!("expires_in is not a number of seconds: {text:?}"))
        }),
    }
}

/// User details derived from the stored ID token and session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BasicUserInfo {
    /// ID token subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Granted scope from the session
    pub allowed_scopes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// Remaining non-empty claims
    pub claims: Map<String, Value>,
}

impl BasicUserInfo {
    /// Combines decoded ID token claims with session scope and state.
    ///
    /// Claims whose value is `null` or an empty string are dropped.
    pub fn from_session(session: &SessionData, payload: IdTokenPayload) -> Self {
        let mut claims: Map<String, Value> = payload
            .claims
            .into_iter()
            .filter(|(_, v)| !is_blank_claim(v))
            .collect();

        let string_claim = |claims: &Map<String, Value>, name: &str| {
            claims.get(name).and_then(Value::as_str).map(str::to_string)
        };
        let display_name = string_claim(&claims, "preferred_username")
            .or_else(|| string_claim(&claims, "name"));
        let email = string_claim(&claims, "email");

        if let Some(iss) = payload.iss.filter(|v| !v.is_empty()) {
            claims.insert("iss".to_string(), Value::String(iss));
        }

        Self {
            username: payload.sub.filter(|v| !v.is_empty()),
            display_name,
            email,
            allowed_scopes: session.scope.clone(),
            session_state: session.session_state.clone(),
            claims,
        }
    }
}

fn is_blank_claim(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
