//! Command-line interface definition
//!
//! One subcommand per step of the OAuth flow. Every subcommand prints a
//! single JSON object to stdout; logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// OAuth 2.0 client toolkit for MCP servers
///
/// Discover authorization server metadata, probe whether a resource needs
/// auth, build a PKCE authorization URL and redeem the resulting code.
#[derive(Parser, Debug)]
#[command(name = "mcp-oauth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file (falls back to CONFIG_PATH, then ./mcp-oauth.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find OAuth authorization server metadata for a server (RFC 8414)
    Discover {
        /// Base URL of the MCP server or authorization server
        server_url: String,
    },

    /// Check whether a resource requires authentication
    Probe {
        /// URL of the protected resource
        resource_url: String,

        /// HTTP method for the probe request
        #[arg(long, value_enum, ignore_case = true, default_value = "OPTIONS")]
        method: ProbeMethod,

        /// Authorization header value to send, e.g. "Bearer abc"
        #[arg(long, env = "MCP_AUTH_HEADER", hide_env_values = true)]
        auth_header: Option<String>,
    },

    /// Build an authorization URL with PKCE and state
    BuildUrl {
        /// The authorization server's authorization_endpoint
        authorization_endpoint: String,

        /// OAuth client ID (defaults to the config file, then "mcp-client")
        #[arg(long)]
        client_id: Option<String>,

        /// Redirect URI registered for the client
        #[arg(long)]
        redirect_uri: Option<String>,

        /// Space-separated scopes
        #[arg(long)]
        scope: Option<String>,

        /// Use this state instead of generating one
        #[arg(long)]
        state: Option<String>,
    },

    /// Exchange an authorization code for tokens
    Exchange {
        /// The authorization server's token_endpoint
        token_endpoint: String,

        /// Authorization code from the redirect
        #[arg(long)]
        code: Option<String>,

        /// PKCE code_verifier returned by build-url
        #[arg(long)]
        code_verifier: Option<String>,

        /// OAuth client ID used for the authorization request
        #[arg(long)]
        client_id: Option<String>,

        /// Redirect URI used for the authorization request
        #[arg(long)]
        redirect_uri: Option<String>,

        /// Client secret for confidential clients. Prefer the env var, which
        /// keeps the secret out of process listings.
        #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
        client_secret: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    #[value(name = "OPTIONS")]
    Options,
    #[value(name = "GET")]
    Get,
    #[value(name = "POST")]
    Post,
    #[value(name = "HEAD")]
    Head,
}

impl From<ProbeMethod> for reqwest::Method {
    fn from(method: ProbeMethod) -> Self {
        match method {
            ProbeMethod::Options => reqwest::Method::OPTIONS,
            ProbeMethod::Get => reqwest::Method::GET,
            ProbeMethod::Post => reqwest::Method::POST,
            ProbeMethod::Head => reqwest::Method::HEAD,
        }
    }
}
