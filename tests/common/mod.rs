use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use oidc_auth::{AuthClientConfig, AuthenticationEngine, MemoryStore, Store};

/// `kid` of the key in `tests/fixtures/jwks.json`.
#[allow(dead_code)]
pub const SIGNING_KID: &str = "signing-key-1";

#[allow(dead_code)]
pub const CLIENT_ID: &str = "test-client";

#[allow(dead_code)]
pub const REDIRECT_URL: &str = "https://app.example.com/callback";

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn jwks_json() -> serde_json::Value {
    let raw = fs::read_to_string(fixture_path("jwks.json")).expect("jwks fixture");
    serde_json::from_str(&raw).expect("jwks fixture is JSON")
}

/// Signs `claims` with the fixture RSA key using RS256.
#[allow(dead_code)]
pub fn sign_token(claims: &serde_json::Value, kid: Option<&str>) -> String {
    let pem = fs::read(fixture_path("rsa-private.pem")).expect("private key fixture");
    let key = EncodingKey::from_rsa_pem(&pem).expect("valid RSA PEM");
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    jsonwebtoken::encode(&header, claims, &key).expect("token signs")
}

/// Standard ID token claims for `sub`, issued by `issuer` to [`CLIENT_ID`],
/// expiring `expires_in` seconds from now.
#[allow(dead_code)]
pub fn id_token_claims(issuer: &str, sub: &str, expires_in: i64) -> serde_json::Value {
    let now = Utc::now().timestamp();
    serde_json::json!({
        "sub": sub,
        "iss": issuer,
        "aud": CLIENT_ID,
        "iat": now,
        "exp": now + expires_in,
        "email": "alice@example.com",
        "preferred_username": "alice",
        "nickname": ""
    })
}

/// Discovery document with every endpoint under `base_url`.
#[allow(dead_code)]
pub fn discovery_body(base_url: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{}/authorize", base_url),
        "token_endpoint": format!("{}/token", base_url),
        "revocation_endpoint": format!("{}/revoke", base_url),
        "end_session_endpoint": format!("{}/logout", base_url),
        "jwks_uri": format!("{}/jwks", base_url),
        "userinfo_endpoint": format!("{}/userinfo", base_url),
        "response_types_supported": ["code"]
    })
}

#[allow(dead_code)]
pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri())))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub fn config_for(base_url: &str) -> AuthClientConfig {
    let mut config = AuthClientConfig::new(CLIENT_ID, base_url, REDIRECT_URL);
    config.scope = vec!["profile".to_string()];
    config
}

#[allow(dead_code)]
pub async fn engine_with(config: AuthClientConfig, store: Arc<dyn Store>) -> AuthenticationEngine {
    AuthenticationEngine::builder(config)
        .store(store)
        .instance_id("it")
        .build()
        .await
        .expect("engine builds")
}

/// Engine against `server` with discovery already resolved.
#[allow(dead_code)]
pub async fn discovered_engine(server: &MockServer) -> AuthenticationEngine {
    mount_discovery(server).await;
    let engine = engine_with(config_for(&server.uri()), Arc::new(MemoryStore::new())).await;
    engine
        .get_oidc_provider_metadata(false)
        .await
        .expect("metadata resolves");
    engine
}

/// Decodes a form-encoded request body into ordered pairs.
#[allow(dead_code)]
pub fn form_pairs(request: &Request) -> Vec<(String, String)> {
    url::form_urlencoded::parse(&request.body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[allow(dead_code)]
pub fn form_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
