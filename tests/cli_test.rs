#![allow(deprecated)]

//! End-to-end tests for the oidc-auth binary
//!
//! Each test points the binary at a temporary config file and state
//! database so runs never touch the user's data directory.

use assert_cmd::Command;
use base64::Engine as _;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

const ENV_OVERRIDES: [&str; 7] = [
    "OIDC_AUTH_CLIENT_ID",
    "OIDC_AUTH_CLIENT_SECRET",
    "OIDC_AUTH_BASE_URL",
    "OIDC_AUTH_SIGN_IN_REDIRECT_URL",
    "OIDC_AUTH_SIGN_OUT_REDIRECT_URL",
    "OIDC_AUTH_SCOPE",
    "OIDC_AUTH_ENABLE_PKCE",
];

fn oidc_auth(config: &std::path::Path, store: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("oidc-auth").unwrap();
    for var in ENV_OVERRIDES {
        cmd.env_remove(var);
    }
    cmd.env_remove("OIDC_AUTH_CONFIG")
        .env_remove("OIDC_AUTH_STORE")
        .arg("--config")
        .arg(config)
        .arg("--store")
        .arg(store.path().join("state.db"));
    cmd
}

fn override_config() -> String {
    "client_id: cli-client\n\
     base_url: https://op.example.com\n\
     sign_in_redirect_url: https://app.example.com/cb\n\
     sign_out_redirect_url: https://app.example.com/bye\n\
     scope: [profile, email]\n\
     override_well_known_endpoint_config: true\n\
     endpoints:\n  \
       authorization_endpoint: https://op.example.com/custom/authorize\n"
        .to_string()
}

#[test]
fn test_decode_id_token_needs_no_config() {
    let payload =
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"sub":"alice","acr":"1"}"#);
    let mut cmd = Command::cargo_bin("oidc-auth").unwrap();
    cmd.arg("--config")
        .arg("/nonexistent/oidc-auth.yaml")
        .arg("decode-id-token")
        .arg(format!("e30.{payload}.sig"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"sub\": \"alice\""))
        .stdout(predicate::str::contains("\"acr\": \"1\""));
}

#[test]
fn test_decode_id_token_rejects_garbage() {
    let mut cmd = Command::cargo_bin("oidc-auth").unwrap();
    cmd.arg("decode-id-token").arg("not-a-token");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expected 3 segments"));
}

#[test]
fn test_missing_config_file_fails() {
    let store = TempDir::new().unwrap();
    let mut cmd = oidc_auth(std::path::Path::new("/nonexistent/oidc-auth.yaml"), &store);
    cmd.arg("discover");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_fails_validation() {
    let (_dir, config) = common::temp_config_file(
        "client_id: \"  \"\nbase_url: https://op.example.com\nsign_in_redirect_url: https://app.example.com/cb\n",
    );
    let store = TempDir::new().unwrap();
    let mut cmd = oidc_auth(&config, &store);
    cmd.arg("discover");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("client_id cannot be empty"));
}

#[test]
fn test_grant_requires_data() {
    let (_dir, config) = common::temp_config_file(&override_config());
    let store = TempDir::new().unwrap();
    let mut cmd = oidc_auth(&config, &store);
    cmd.arg("grant");

    cmd.assert().failure();
}

#[test]
fn test_authorize_url_uses_configured_endpoint() {
    let (_dir, config) = common::temp_config_file(&override_config());
    let store = TempDir::new().unwrap();
    let mut cmd = oidc_auth(&config, &store);
    cmd.arg("authorize-url").arg("--param").arg("state=xyz");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(
            "https://op.example.com/custom/authorize?response_type=code&client_id=cli-client",
        ))
        .stdout(predicate::str::contains("scope=profile+email+openid"))
        .stdout(predicate::str::contains("code_challenge_method=S256"))
        .stdout(predicate::str::contains("state=xyz"));
}

#[test]
fn test_discover_reports_fallback_state_for_overrides() {
    let (_dir, config) = common::temp_config_file(&override_config());
    let store = TempDir::new().unwrap();
    let mut cmd = oidc_auth(&config, &store);
    cmd.arg("discover");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"fallback\""))
        .stdout(predicate::str::contains(
            "https://op.example.com/custom/authorize",
        ))
        .stdout(predicate::str::contains("https://op.example.com/oauth2/token"));
}

#[test]
fn test_user_info_without_session_fails() {
    let (_dir, config) = common::temp_config_file(&override_config());
    let store = TempDir::new().unwrap();
    let mut cmd = oidc_auth(&config, &store);
    cmd.arg("user-info");

    cmd.assert().failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_authorize_then_exchange_across_invocations() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "cli-access",
            "token_type": "Bearer",
            "expires_in": 60
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dir, config) = common::temp_config_file(&format!(
        "client_id: cli-client\nbase_url: {}\nsign_in_redirect_url: https://app.example.com/cb\n",
        server.uri()
    ));
    let store = TempDir::new().unwrap();

    let output = tokio::task::spawn_blocking(move || {
        let authorize = oidc_auth(&config, &store)
            .arg("authorize-url")
            .assert()
            .success();
        let exchange = oidc_auth(&config, &store)
            .arg("exchange")
            .arg("--code")
            .arg("abc")
            .assert()
            .success();
        drop(dir);
        (
            String::from_utf8_lossy(&authorize.get_output().stdout).into_owned(),
            String::from_utf8_lossy(&exchange.get_output().stdout).into_owned(),
        )
    })
    .await
    .unwrap();

    let (authorize_url, session) = output;
    assert!(authorize_url.starts_with(&format!("{}/authorize?", server.uri())));
    let session: serde_json::Value = serde_json::from_str(&session).unwrap();
    assert_eq!(session["access_token"], "cli-access");
    assert_eq!(session["expires_in"], 60);
}
