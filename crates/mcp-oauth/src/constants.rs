//! Protocol constants
//!
//! Well-known paths, header values and default timeouts shared by the
//! discovery, probe and token exchange components.

use std::time::Duration;

/// Client ID used when the caller does not supply one.
pub const DEFAULT_CLIENT_ID: &str = "mcp-client";

/// RFC 8414 discovery paths, tried in this order.
pub const DISCOVERY_PATHS: [&str; 2] = [
    "/.well-known/oauth-authorization-server",
    "/.well-known/openid-configuration",
];

/// The only PKCE method this toolkit emits.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Default verifier entropy: 32 bytes encode to the 43-char RFC 7636 minimum.
pub const DEFAULT_VERIFIER_BYTES: usize = 32;

/// Default state entropy.
pub const DEFAULT_STATE_BYTES: usize = 16;

/// Per-candidate timeout for metadata discovery requests.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the auth requirement probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the token endpoint request.
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// `Accept` header for the probe. Streamable MCP endpoints reject requests
/// that do not advertise `text/event-stream`.
pub const PROBE_ACCEPT: &str = "application/json, text/event-stream";

/// `discovered_via` tag for metadata found through a `WWW-Authenticate` hint.
pub const VIA_WWW_AUTHENTICATE: &str = "www-authenticate-header";
