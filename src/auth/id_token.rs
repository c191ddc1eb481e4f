//! ID token decoding and verification
//!
//! [`decode_id_token`] is a purely structural read of the claim set and
//! performs no signature or expiry checks. [`verify_id_token`] selects the
//! signing key from a JWK set by `kid` and validates signature, audience,
//! issuer, subject and expiry with `jsonwebtoken`.

use base64::Engine as _;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Signature algorithms accepted by [`IdTokenValidation::new`].
pub const SUPPORTED_SIGNATURE_ALGORITHMS: [Algorithm; 8] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// The `aud` claim, which OIDC allows to be a string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience
    Single(String),
    /// Several audiences
    Multiple(Vec<String>),
}

/// Claim set carried in the second segment of an ID token.
///
/// The standard claims are lifted into fields; everything else stays in
/// [`claims`](Self::claims).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdTokenPayload {
    /// Subject identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issuer identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Intended audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiry, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued-at, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Provider-specific claims
    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Expected values checked by [`verify_id_token`].
#[derive(Debug, Clone)]
pub struct IdTokenValidation {
    /// Must appear in `aud`
    pub client_id: String,
    /// Must equal `iss`
    pub issuer: String,
    /// Must equal `sub`
    pub subject: String,
    /// Leeway applied to `exp`, in seconds
    pub clock_tolerance: u64,
    /// Allow-list of signature algorithms
    pub algorithms: Vec<Algorithm>,
}

impl IdTokenValidation {
    /// Creates a validation profile restricted to
    /// [`SUPPORTED_SIGNATURE_ALGORITHMS`].
    pub fn new(
        client_id: impl Into<String>,
        issuer: impl Into<String>,
        subject: impl Into<String>,
        clock_tolerance: u64,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            issuer: issuer.into(),
            subject: subject.into(),
            clock_tolerance,
            algorithms: SUPPORTED_SIGNATURE_ALGORITHMS.to_vec(),
        }
    }
}

/// Decodes the claim set of `token` without verifying it.
///
/// # Errors
///
/// Returns [`AuthError::TokenDecoding`] when the token does not have three
/// dot-separated segments, the payload is not base64url, or it is not a JSON
/// object.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::id_token::decode_id_token;
///
/// // {"sub":"alice"}
/// let token = "e30.eyJzdWIiOiJhbGljZSJ9.c2ln";
/// let payload = decode_id_token(token).unwrap();
/// assert_eq!(payload.sub.as_deref(), Some("alice"));
/// ```
pub fn decode_id_token(token: &str) -> Result<IdTokenPayload> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::TokenDecoding(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| AuthError::TokenDecoding(format!("payload is not base64url: {e}")))?;

    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::TokenDecoding(format!("payload is not JSON: {e}")))?;

    if !value.is_object() {
        return Err(AuthError::TokenDecoding(
            "payload is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| AuthError::TokenDecoding(format!("payload has malformed claims: {e}")))
}

/// Verifies `token` against `jwks` and the expectations in `validation`.
///
/// # Errors
///
/// - [`AuthError::TokenValidation`] if the header cannot be read, the
///   algorithm is not allowed, or any signature or claim check fails.
/// - [`AuthError::KeyNotFound`] if no key in `jwks` carries the header's `kid`.
pub fn verify_id_token(
    token: &str,
    jwks: &JwkSet,
    validation: &IdTokenValidation,
) -> Result<IdTokenPayload> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| AuthError::TokenValidation {
        message: "unreadable token header".to_string(),
        source: Some(e),
    })?;

    if !validation.algorithms.contains(&header.alg) {
        return Err(AuthError::TokenValidation {
            message: format!("algorithm {:?} is not allowed", header.alg),
            source: None,
        });
    }

    let jwk = header
        .kid
        .as_deref()
        .and_then(|kid| jwks.find(kid))
        .ok_or_else(|| AuthError::KeyNotFound {
            kid: header.kid.clone(),
            candidates: jwks
                .keys
                .iter()
                .filter_map(|k| k.common.key_id.clone())
                .collect(),
        })?;

    let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::TokenValidation {
        message: "unusable signing key".to_string(),
        source: Some(e),
    })?;

    // Only the header's algorithm, already checked against the allow-list
    let mut rules = Validation::new(header.alg);
    rules.leeway = validation.clock_tolerance;
    rules.set_audience(&[validation.client_id.as_str()]);
    rules.set_issuer(&[validation.issuer.as_str()]);
    rules.sub = Some(validation.subject.clone());
    rules.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    let data = jsonwebtoken::decode::<IdTokenPayload>(token, &key, &rules).map_err(|e| {
        AuthError::TokenValidation {
            message: e.to_string(),
            source: Some(e),
        }
    })?;

    tracing::debug!(kid = ?header.kid, "ID token signature verified");
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_segment(json: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    fn unsigned_token(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            encode_segment(r#"{"alg":"none"}"#),
            encode_segment(payload)
        )
    }

    #[test]
    fn test_decode_lifts_standard_claims() {
        let token = unsigned_token(
            r#"{"sub":"alice","iss":"https://op","aud":"client","exp":10,"iat":5,"email":"a@x"}"#,
        );
        let payload = decode_id_token(&token).expect("decodes");
        assert_eq!(payload.sub.as_deref(), Some("alice"));
        assert_eq!(payload.iss.as_deref(), Some("https://op"));
        assert_eq!(payload.aud, Some(Audience::Single("client".to_string())));
        assert_eq!(payload.exp, Some(10));
        assert_eq!(payload.iat, Some(5));
        assert_eq!(payload.claims["email"], "a@x");
        assert!(!payload.claims.contains_key("sub"));
    }

    #[test]
    fn test_decode_accepts_audience_array() {
        let token = unsigned_token(r#"{"aud":["a","b"]}"#);
        let payload = decode_id_token(&token).expect("decodes");
        assert_eq!(
            payload.aud,
            Some(Audience::Multiple(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let token = format!("e30.{}==.sig", encode_segment(r#"{"sub":"bob"}"#));
        let payload = decode_id_token(&token).expect("decodes");
        assert_eq!(payload.sub.as_deref(), Some("bob"));
    }

    #[test]
    fn test_decode_rejects_non_json_payload() {
        let token = format!("e30.{}.sig", encode_segment("not json"));
        let err = decode_id_token(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenDecoding(_)));
    }

    #[test]
    fn test_decode_rejects_non_object_payload() {
        let token = unsigned_token("[1,2,3]");
        assert!(matches!(
            decode_id_token(&token),
            Err(AuthError::TokenDecoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_segment_count() {
        assert!(matches!(
            decode_id_token("only.two"),
            Err(AuthError::TokenDecoding(_))
        ));
        assert!(matches!(
            decode_id_token(""),
            Err(AuthError::TokenDecoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(matches!(
            decode_id_token("e30.@@@.sig"),
            Err(AuthError::TokenDecoding(_))
        ));
    }

    #[test]
    fn test_verify_rejects_disallowed_algorithm_before_key_lookup() {
        // HS256 header
        let token = format!(
            "{}.{}.sig",
            encode_segment(r#"{"alg":"HS256","typ":"JWT","kid":"k"}"#),
            encode_segment(r#"{"sub":"a"}"#)
        );
        let jwks = JwkSet { keys: vec![] };
        let validation = IdTokenValidation::new("client", "issuer", "a", 0);
        let err = verify_id_token(&token, &jwks, &validation).unwrap_err();
        assert!(matches!(err, AuthError::TokenValidation { .. }));
    }

    #[test]
    fn test_default_validation_covers_rsa_pss_and_ec() {
        let validation = IdTokenValidation::new("client", "issuer", "a", 0);
        for alg in [Algorithm::RS256, Algorithm::PS512, Algorithm::ES256, Algorithm::ES384] {
            assert!(validation.algorithms.contains(&alg), "{alg:?}");
        }
        assert!(!validation.algorithms.contains(&Algorithm::HS256));
    }

    #[test]
    fn test_verify_reports_missing_kid_with_candidates() {
        let token = format!(
            "{}.{}.sig",
            encode_segment(r#"{"alg":"RS256","typ":"JWT","kid":"unknown"}"#),
            encode_segment(r#"{"sub":"a"}"#)
        );
        let jwks: JwkSet = serde_json::from_str(
            r#"{"keys":[{"kty":"RSA","kid":"known","n":"AQAB","e":"AQAB"}]}"#,
        )
        .expect("jwks parses");
        let validation = IdTokenValidation::new("client", "issuer", "a", 0);
        match verify_id_token(&token, &jwks, &validation) {
            Err(AuthError::KeyNotFound { kid, candidates }) => {
                assert_eq!(kid.as_deref(), Some("unknown"));
                assert_eq!(candidates, vec!["known".to_string()]);
            }
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }
}
