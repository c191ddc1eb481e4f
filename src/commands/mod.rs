/*!
Command handlers for the CLI

Each handler drives one [`AuthenticationEngine`] operation and renders the
result for the terminal: URLs are printed bare, everything else as pretty
JSON. Handlers return the rendered text so the entrypoint only prints it.
*/

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use crate::auth::id_token::decode_id_token;
use crate::auth::{AuthenticationEngine, CustomGrantConfig, CustomGrantResponse};
use crate::cli::Commands;
use crate::error::Result;

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Runs `command` against `engine` and returns the text to print.
///
/// Every command except `discover` uses cached metadata, resolving it first
/// when nothing is cached yet.
///
/// # Errors
///
/// Propagates the engine error of the underlying operation.
pub async fn execute(engine: &AuthenticationEngine, command: Commands) -> Result<String> {
    let needs_metadata = !matches!(
        command,
        Commands::Discover { .. } | Commands::DecodeIdToken { .. }
    );
    if needs_metadata {
        engine.get_oidc_provider_metadata(false).await?;
    }

    match command {
        Commands::Discover { force } => discover(engine, force).await,
        Commands::AuthorizeUrl { params } => engine.build_authorization_url(params).await,
        Commands::Exchange {
            code,
            session_state,
        } => {
            let session = engine
                .exchange_authorization_code(&code, session_state.as_deref())
                .await?;
            pretty(&session)
        }
        Commands::Refresh => pretty(&engine.refresh_access_token().await?),
        Commands::Revoke => {
            let response = engine.revoke_access_token().await?;
            pretty(&json!({ "revoked": true, "status": response.status }))
        }
        Commands::Grant {
            data,
            endpoint,
            attach_token,
            session,
        } => {
            let grant = CustomGrantConfig {
                id: "cli".to_string(),
                token_endpoint: endpoint,
                data: data.into_iter().collect::<BTreeMap<_, _>>(),
                attach_token,
                returns_session: session,
                sign_in_required: false,
            };
            match engine.request_custom_grant(&grant).await? {
                CustomGrantResponse::Session(session) => pretty(&session),
                CustomGrantResponse::Raw(response) => pretty(&response),
            }
        }
        Commands::UserInfo => pretty(&engine.get_basic_user_info().await?),
        Commands::SignOut => engine.sign_out().await,
        Commands::DecodeIdToken { token } => decode(&token),
    }
}

async fn discover(engine: &AuthenticationEngine, force: bool) -> Result<String> {
    engine.get_oidc_provider_metadata(force).await?;
    let state = engine.metadata_state().await?;
    let endpoints = engine.get_service_endpoints().await?;
    tracing::info!(state = ?state, "Provider metadata resolved");
    pretty(&json!({ "state": state, "endpoints": endpoints }))
}

/// Decodes an ID token and renders its claims.
///
/// Needs no configuration or stored state.
pub fn decode(token: &str) -> Result<String> {
    pretty(&decode_id_token(token)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthClientConfig;
    use crate::error::{AuthError, Missing};
    use base64::Engine as _;

    async fn engine() -> AuthenticationEngine {
        let mut config = AuthClientConfig::new(
            "cli-client",
            "https://op.example.com",
            "https://app.example.com/cb",
        );
        config.override_well_known_endpoint_config = true;
        AuthenticationEngine::builder(config).build().await.unwrap()
    }

    #[tokio::test]
    async fn test_discover_reports_state_and_endpoints() {
        let engine = engine().await;
        let out = execute(&engine, Commands::Discover { force: false })
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["state"], "fallback");
        assert_eq!(
            value["endpoints"]["token_endpoint"],
            "https://op.example.com/oauth2/token"
        );
    }

    #[tokio::test]
    async fn test_authorize_url_is_printed_bare() {
        let engine = engine().await;
        let out = execute(
            &engine,
            Commands::AuthorizeUrl {
                params: vec![("state".to_string(), "abc".to_string())],
            },
        )
        .await
        .unwrap();
        assert!(out.starts_with("https://op.example.com/oauth2/authorize?response_type=code"));
        assert!(out.ends_with("state=abc"));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_fails() {
        let engine = engine().await;
        let err = execute(&engine, Commands::SignOut).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(Missing::IdToken)));
    }

    #[test]
    fn test_decode_renders_claims() {
        let payload =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"sub":"alice","x":1}"#);
        let out = decode(&format!("e30.{payload}.sig")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["sub"], "alice");
        assert_eq!(value["x"], 1);
    }
}
