//! Error types for OAuth client operations
//!
//! Only caller mistakes and transport failures are Rust errors. Upstream
//! responses that carry a structured outcome (a token endpoint `invalid_grant`,
//! a probe answered with `404`) are result variants, and speculative lookups
//! that find nothing are `NotFound` results rather than errors.

/// Errors from OAuth client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{0}")]
    Timeout(String),

    #[error("upstream protocol error: {0}")]
    UpstreamProtocol(String),
}

impl Error {
    /// Stable machine-readable category, used in structured error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) | Error::MissingParameters(_) => "invalid_input",
            Error::Http(_) => "network",
            Error::Timeout(_) => "timeout",
            Error::UpstreamProtocol(_) => "upstream_protocol",
        }
    }

    /// Whether the caller supplied bad input (as opposed to a network or
    /// upstream failure). These are always raised before any request is sent.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::MissingParameters(_))
    }
}

/// Result alias for OAuth client operations.
pub type Result<T> = std::result::Result<T, Error>;
