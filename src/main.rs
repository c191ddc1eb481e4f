//! oidc-auth - OAuth2 authorization code + PKCE client
//!
#![doc = "oidc-auth - OAuth2 authorization code + PKCE client"]
#![doc = "Main entry point for the oidc-auth command-line tool."]

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use oidc_auth::cli::{Cli, Commands};
use oidc_auth::commands;
use oidc_auth::config::AuthClientConfig;
use oidc_auth::storage::{SledStore, Store};
use oidc_auth::AuthenticationEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Decoding needs neither configuration nor stored state
    if let Commands::DecodeIdToken { token } = &cli.command {
        println!("{}", commands::decode(token)?);
        return Ok(());
    }

    let config = AuthClientConfig::load(&cli.config)?;
    config.validate()?;

    let store = match &cli.store {
        Some(path) => SledStore::new(path)?,
        None => SledStore::open_default()?,
    };
    tracing::debug!(instance = %cli.instance, "Opened state store");

    let engine = AuthenticationEngine::builder(config)
        .store(Arc::new(store) as Arc<dyn Store>)
        .instance_id(cli.instance.clone())
        .build()
        .await?;

    let output = commands::execute(&engine, cli.command).await?;
    println!("{output}");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("oidc_auth=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oidc_auth=info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
