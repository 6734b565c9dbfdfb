//! MCP OAuth client CLI
//!
//! Single-binary front end for the `mcp-oauth` library, meant to be driven
//! by an agent one step at a time:
//! 1. `discover` finds the authorization server metadata
//! 2. `probe` checks whether a resource needs auth at all
//! 3. `build-url` produces the authorization URL, verifier and state
//! 4. `exchange` redeems the code from the redirect for tokens
//!
//! stdout carries exactly one JSON object; structured logs go to stderr.

mod cli;
mod config;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use common::Secret;
use mcp_oauth::{
    AuthorizationParams, DEFAULT_CLIENT_ID, DiscoveryOptions, ExchangeOptions, ProbeOptions,
    TokenRequest,
};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::output::Outcome;

const USER_AGENT: &str = concat!("mcp-oauth/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> ExitCode {
    // JSON logs on stderr with LOG_LEVEL / RUST_LOG support; quiet by default
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(outcome) => outcome.emit(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            output::internal_error(&e).emit()
        }
    }
}

/// Execute one subcommand and render its outcome.
async fn run(cli: Cli) -> Result<Outcome> {
    let config_path = Config::resolve_path(cli.config.as_deref());
    if let Some(path) = &config_path {
        debug!(path = %path.display(), "loading configuration");
    }
    let config = match Config::load_optional(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "invalid configuration");
            return Ok(output::config_error(&e));
        }
    };

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build HTTP client")?;

    execute(&client, &config, cli.command).await
}

async fn execute(client: &reqwest::Client, config: &Config, command: Command) -> Result<Outcome> {
    let outcome = match command {
        Command::Discover { server_url } => {
            let options = DiscoveryOptions {
                timeout: config.discovery_timeout(),
            };
            match mcp_oauth::discover(client, &server_url, &options).await {
                Ok(result) => output::discovery(&result)?,
                Err(e) => output::error(&e),
            }
        }

        Command::Probe {
            resource_url,
            method,
            auth_header,
        } => {
            let options = ProbeOptions {
                method: method.into(),
                auth_header: auth_header.filter(|h| !h.is_empty()).map(Secret::new),
                timeout: config.probe_timeout(),
            };
            match mcp_oauth::probe(client, &resource_url, &options).await {
                Ok(result) => output::probe(&result)?,
                Err(e) => output::error(&e),
            }
        }

        Command::BuildUrl {
            authorization_endpoint,
            client_id,
            redirect_uri,
            scope,
            state,
        } => {
            let params = AuthorizationParams {
                client_id: client_id
                    .or_else(|| config.client.client_id.clone())
                    .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
                redirect_uri: redirect_uri
                    .or_else(|| config.client.redirect_uri.clone())
                    .unwrap_or_default(),
                scope: scope.or_else(|| config.client.scope.clone()),
                state,
                pkce: None,
            };
            match mcp_oauth::build(&authorization_endpoint, params) {
                Ok(request) => output::authorization(&request)?,
                Err(e) => output::error(&e),
            }
        }

        Command::Exchange {
            token_endpoint,
            code,
            code_verifier,
            client_id,
            redirect_uri,
            client_secret,
        } => {
            let request = TokenRequest {
                code,
                code_verifier: code_verifier.map(Secret::new),
                client_id: client_id.or_else(|| config.client.client_id.clone()),
                redirect_uri: redirect_uri.or_else(|| config.client.redirect_uri.clone()),
                client_secret: client_secret.map(Secret::new),
            };
            let options = ExchangeOptions {
                timeout: config.token_timeout(),
            };
            match mcp_oauth::exchange(client, &token_endpoint, &request, &options).await {
                Ok(result) => output::token(&result)?,
                Err(e) => output::error(&e),
            }
        }
    };
    Ok(outcome)
}
