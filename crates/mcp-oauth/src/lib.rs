//! OAuth 2.0 client toolkit for MCP-style protected resources
//!
//! Everything an agent needs to get a token from an authorization server it
//! has never seen before, without a browser SDK. The library holds no state
//! between calls; every operation takes explicit parameters and returns one
//! structured result.
//!
//! Session flow:
//! 1. `discovery::discover()` finds the authorization and token endpoints
//!    (or `probe::probe()` decides whether auth is needed at all)
//! 2. `authorize::build()` produces the authorization URL plus the PKCE
//!    verifier and `state` the caller must keep
//! 3. An external redirect listener captures `code` and `state`
//! 4. `token::exchange()` redeems the code with the verifier

pub mod authorize;
pub mod challenge;
pub mod constants;
pub mod discovery;
pub mod error;
mod lenient;
pub mod pkce;
pub mod probe;
pub mod token;

pub use authorize::{AuthorizationParams, AuthorizationRequest, build};
pub use constants::*;
pub use discovery::{DiscoveredMetadata, DiscoveryOptions, DiscoveryResult, discover};
pub use error::{Error, Result};
pub use pkce::{PkcePair, derive_challenge, generate_state, generate_verifier};
pub use probe::{AuthRequirement, ProbeOptions, ProbeResult, probe};
pub use token::{ExchangeOptions, TokenError, TokenRequest, TokenResult, TokenSet, exchange};

#[cfg(test)]
pub(crate) mod test_support {
    use tokio::net::TcpListener;

    /// Serve `app` on an ephemeral localhost port and return its base URL.
    pub async fn serve(app: axum::Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// A localhost URL nothing is listening on.
    pub async fn unreachable_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }
}
