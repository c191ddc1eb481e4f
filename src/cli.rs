//! Command-line interface definition for oidc-auth
//!
//! This module defines the CLI structure using clap's derive API. State is
//! kept in a persistent store between invocations so that a flow can be run
//! one step at a time.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// oidc-auth - OAuth2 authorization code + PKCE client
///
/// Drive an OpenID Connect sign-in flow step by step from the shell.
#[derive(Parser, Debug, Clone)]
#[command(name = "oidc-auth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "OIDC_AUTH_CONFIG", default_value = "oidc-auth.yaml")]
    pub config: PathBuf,

    /// Path to the state database (defaults to the user data directory)
    #[arg(long, env = "OIDC_AUTH_STORE")]
    pub store: Option<PathBuf>,

    /// Authentication context identity
    #[arg(short, long, default_value = "default")]
    pub instance: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for oidc-auth
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve provider metadata and print the endpoints
    Discover {
        /// Resolve again even if metadata is cached
        #[arg(long)]
        force: bool,
    },

    /// Print the authorization URL and store the PKCE verifier
    AuthorizeUrl {
        /// Extra query parameter, `key=value`
        #[arg(short, long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// Exchange an authorization code for tokens
    Exchange {
        /// Authorization code from the redirect
        #[arg(long)]
        code: String,

        /// `session_state` from the redirect
        #[arg(long)]
        session_state: Option<String>,
    },

    /// Refresh the access token
    Refresh,

    /// Revoke the access token and clear the session
    Revoke,

    /// Send a custom grant request
    Grant {
        /// Form field, `key=value`; values may contain template tags
        #[arg(short, long = "data", value_parser = parse_key_value, required = true)]
        data: Vec<(String, String)>,

        /// Endpoint to POST to instead of the token endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Send the access token as a bearer token
        #[arg(long)]
        attach_token: bool,

        /// Store the response as the new session
        #[arg(long)]
        session: bool,
    },

    /// Print user details from the stored ID token
    UserInfo,

    /// Print the logout URL and clear the session
    SignOut,

    /// Decode an ID token without verifying it
    DecodeIdToken {
        /// The encoded token
        token: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parses a `key=value` argument.
///
/// The value may itself contain `=`.
pub fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::try_parse_from(["oidc-auth", "refresh"]).unwrap();
        assert_eq!(cli.instance, "default");
        assert!(!cli.verbose);
        assert!(cli.store.is_none());
        assert!(matches!(cli.command, Commands::Refresh));
    }

    #[test]
    fn test_cli_parse_authorize_url_params() {
        let cli = Cli::try_parse_from([
            "oidc-auth",
            "authorize-url",
            "--param",
            "state=abc",
            "-p",
            "nonce=a=b",
        ])
        .unwrap();
        if let Commands::AuthorizeUrl { params } = cli.command {
            assert_eq!(
                params,
                vec![
                    ("state".to_string(), "abc".to_string()),
                    ("nonce".to_string(), "a=b".to_string())
                ]
            );
        } else {
            panic!("Expected AuthorizeUrl command");
        }
    }

    #[test]
    fn test_cli_parse_exchange() {
        let cli = Cli::try_parse_from([
            "oidc-auth",
            "--instance",
            "ctx",
            "exchange",
            "--code",
            "c1",
            "--session-state",
            "s1",
        ])
        .unwrap();
        assert_eq!(cli.instance, "ctx");
        if let Commands::Exchange {
            code,
            session_state,
        } = cli.command
        {
            assert_eq!(code, "c1");
            assert_eq!(session_state.as_deref(), Some("s1"));
        } else {
            panic!("Expected Exchange command");
        }
    }

    #[test]
    fn test_cli_grant_requires_data() {
        assert!(Cli::try_parse_from(["oidc-auth", "grant"]).is_err());
        let cli = Cli::try_parse_from([
            "oidc-auth",
            "grant",
            "--data",
            "grant_type=urn:custom",
            "--attach-token",
            "--session",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Grant {
                attach_token: true,
                session: true,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_key_value_rejects_missing_key() {
        assert!(parse_key_value("=v").is_err());
        assert!(parse_key_value("novalue").is_err());
        assert_eq!(
            parse_key_value("k=").unwrap(),
            ("k".to_string(), String::new())
        );
    }
}
