//! Authorization request builder
//!
//! Composes the authorization URL for the Authorization Code + PKCE flow and
//! hands back everything the caller has to keep until the redirect comes
//! back: the code verifier for the token exchange and the `state` to match
//! against the callback. Pure construction, no network I/O.

use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::pkce::{self, PkcePair};

/// Query parameters this builder owns. Existing values on the endpoint URL
/// with these names are replaced.
const MANAGED_PARAMS: [&str; 7] = [
    "response_type",
    "client_id",
    "redirect_uri",
    "state",
    "code_challenge",
    "code_challenge_method",
    "scope",
];

/// Caller inputs for an authorization request.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationParams {
    pub client_id: String,
    pub redirect_uri: String,
    /// Space-separated scopes. `None` or empty omits the parameter entirely.
    pub scope: Option<String>,
    /// Used verbatim when non-empty; otherwise a random state is generated.
    pub state: Option<String>,
    /// Pre-generated PKCE pair; a fresh one is generated when absent.
    pub pkce: Option<PkcePair>,
}

/// A built authorization request.
///
/// Serializes to the object handed back to the calling agent. It includes
/// the code verifier, which the caller must store for the token exchange.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub authorization_endpoint: String,
    pub state: String,
    #[serde(flatten)]
    pub pkce: PkcePair,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Build an authorization URL for `auth_endpoint`.
///
/// Input problems (unparseable endpoint, empty `redirect_uri` or
/// `client_id`) are reported as [`Error::InvalidInput`] before any PKCE or
/// state material is generated.
pub fn build(auth_endpoint: &str, params: AuthorizationParams) -> Result<AuthorizationRequest> {
    let mut url = Url::parse(auth_endpoint.trim()).map_err(|e| {
        Error::InvalidInput(format!(
            "invalid authorization endpoint {auth_endpoint:?}: {e}"
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "authorization endpoint must use http or https, got {}",
            url.scheme()
        )));
    }

    let redirect_uri = params.redirect_uri.trim();
    if redirect_uri.is_empty() {
        return Err(Error::InvalidInput("redirect_uri is required".into()));
    }
    Url::parse(redirect_uri)
        .map_err(|e| Error::InvalidInput(format!("invalid redirect_uri {redirect_uri:?}: {e}")))?;

    let client_id = params.client_id.trim();
    if client_id.is_empty() {
        return Err(Error::InvalidInput("client_id must not be empty".into()));
    }

    let scope = params.scope.filter(|s| !s.trim().is_empty());
    let state = params
        .state
        .filter(|s| !s.is_empty())
        .unwrap_or_else(pkce::default_state);
    let pkce = params.pkce.unwrap_or_else(PkcePair::generate);

    let preserved: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !MANAGED_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let authorization_endpoint = url.to_string();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(preserved);
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", &state)
            .append_pair("code_challenge", pkce.code_challenge())
            .append_pair("code_challenge_method", pkce.method());
        if let Some(scope) = &scope {
            query.append_pair("scope", scope);
        }
    }

    Ok(AuthorizationRequest {
        authorization_url: url.to_string(),
        authorization_endpoint,
        state,
        pkce,
        client_id: client_id.to_string(),
        redirect_uri: redirect_uri.to_string(),
        scope,
    })
}
