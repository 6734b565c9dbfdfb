//! Authorization Server Metadata discovery (RFC 8414)
//!
//! Locates the authorization and token endpoints for an MCP server that does
//! not advertise them directly. Candidates are tried strictly in order and the
//! first valid document wins:
//!
//! 1. `{server}/.well-known/oauth-authorization-server`
//! 2. `{server}/.well-known/openid-configuration`
//! 3. the same two paths at the scheme+host root, when the server URL has a
//!    path (e.g. an MCP endpoint mounted at `/mcp`)
//! 4. the same two paths under the authorization server named in the
//!    `WWW-Authenticate` header of a `401`/`403` from the server URL itself
//!
//! Every candidate failure (timeout, refused connection, non-2xx, malformed
//! JSON, missing `authorization_endpoint`) just eliminates that candidate.
//! Discovery is speculative, so exhausting the list is a normal `not_found`
//! or `requires_auth` outcome, not an error.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::challenge::auth_param;
use crate::constants::{
    CODE_CHALLENGE_METHOD, DISCOVERY_PATHS, DISCOVERY_TIMEOUT, VIA_WWW_AUTHENTICATE,
};
use crate::error::{Error, Result};
use crate::lenient;

/// Tunables for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout applied to each individual request.
    pub timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout: DISCOVERY_TIMEOUT,
        }
    }
}

/// Terminal outcome of a discovery run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscoveryResult {
    Discovered(DiscoveredMetadata),
    /// The server answered `401`/`403` but no metadata could be found.
    RequiresAuth {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        www_authenticate: Option<String>,
        tried: Vec<String>,
        hint: String,
    },
    NotFound {
        message: String,
        tried: Vec<String>,
        hint: String,
    },
}

/// Endpoints and capabilities taken from an accepted metadata document.
///
/// `token_endpoint` and the `*_supported` lists are advisory and passed
/// through as the server sent them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredMetadata {
    pub issuer: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: Option<String>,
    pub registration_endpoint: Option<String>,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    /// The exact URL the document was fetched from.
    pub discovery_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered_via: Option<String>,
}

/// Wire shape of an RFC 8414 / OIDC discovery document. Everything is
/// optional and leniently typed here; acceptance is decided only by
/// `authorization_endpoint` in [`MetadataDocument::accept`].
#[derive(Debug, Deserialize)]
struct MetadataDocument {
    #[serde(default, deserialize_with = "lenient::string")]
    issuer: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    authorization_endpoint: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    token_endpoint: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    registration_endpoint: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    scopes_supported: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    response_types_supported: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    grant_types_supported: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    code_challenge_methods_supported: Option<Vec<String>>,
}

impl MetadataDocument {
    /// Accept the document only if it names a non-empty authorization endpoint.
    fn accept(self, discovery_url: &str) -> Option<DiscoveredMetadata> {
        let authorization_endpoint = self.authorization_endpoint.filter(|e| !e.is_empty())?;
        Some(DiscoveredMetadata {
            issuer: self.issuer,
            authorization_endpoint,
            token_endpoint: self.token_endpoint,
            registration_endpoint: self.registration_endpoint,
            scopes_supported: self.scopes_supported.unwrap_or_default(),
            response_types_supported: self.response_types_supported.unwrap_or_default(),
            grant_types_supported: self.grant_types_supported.unwrap_or_default(),
            code_challenge_methods_supported: self
                .code_challenge_methods_supported
                .unwrap_or_else(|| vec![CODE_CHALLENGE_METHOD.to_string()]),
            discovery_url: discovery_url.to_string(),
            discovered_via: None,
        })
    }
}

/// Ordered candidate search that remembers every URL it has requested.
struct CandidateSearch<'a> {
    client: &'a reqwest::Client,
    timeout: Duration,
    tried: Vec<String>,
}

impl<'a> CandidateSearch<'a> {
    fn new(client: &'a reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            tried: Vec::new(),
        }
    }

    /// Try both well-known paths under `base`, skipping URLs already tried.
    async fn try_base(&mut self, base: &str) -> Option<DiscoveredMetadata> {
        for path in DISCOVERY_PATHS {
            let url = format!("{base}{path}");
            if self.tried.contains(&url) {
                continue;
            }
            self.tried.push(url.clone());

            if let Some(metadata) = self.fetch(&url).await {
                return Some(metadata);
            }
        }
        None
    }

    async fn fetch(&self, url: &str) -> Option<DiscoveredMetadata> {
        let response = match self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(url, error = %e, "discovery candidate unreachable");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url, %status, "discovery candidate not found");
            return None;
        }

        match response.json::<MetadataDocument>().await {
            Ok(document) => {
                let accepted = document.accept(url);
                if accepted.is_none() {
                    debug!(url, "metadata document has no authorization_endpoint");
                }
                accepted
            }
            Err(e) => {
                debug!(url, error = %e, "discovery candidate returned unparseable metadata");
                None
            }
        }
    }
}

/// Discover OAuth metadata for an MCP server.
///
/// Returns `Err` only for caller input problems (an unparseable or non-HTTP
/// `server_url`). Network failures never surface as errors.
pub async fn discover(
    client: &reqwest::Client,
    server_url: &str,
    options: &DiscoveryOptions,
) -> Result<DiscoveryResult> {
    let server_url = server_url.trim();
    let parsed = Url::parse(server_url)
        .map_err(|e| Error::InvalidInput(format!("invalid server URL {server_url:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "server URL must use http or https, got {}",
            parsed.scheme()
        )));
    }

    let base = normalize_url(server_url);
    let mut search = CandidateSearch::new(client, options.timeout);

    if let Some(metadata) = search.try_base(&base).await {
        info!(discovery_url = %metadata.discovery_url, "discovered OAuth metadata");
        return Ok(DiscoveryResult::Discovered(metadata));
    }

    if let Some(root) = root_url(&parsed) {
        if let Some(metadata) = search.try_base(&root).await {
            info!(discovery_url = %metadata.discovery_url, "discovered OAuth metadata at server root");
            return Ok(DiscoveryResult::Discovered(metadata));
        }
    }

    if let Some(challenge) = challenge_server(client, &base, options.timeout).await {
        if let Some(auth_server) = challenge.as_deref().and_then(authorization_server_hint) {
            debug!(auth_server, "following WWW-Authenticate to authorization server");
            if let Some(mut metadata) = search.try_base(&normalize_url(&auth_server)).await {
                metadata.discovered_via = Some(VIA_WWW_AUTHENTICATE.to_string());
                info!(discovery_url = %metadata.discovery_url, "discovered OAuth metadata via WWW-Authenticate");
                return Ok(DiscoveryResult::Discovered(metadata));
            }
        }

        return Ok(DiscoveryResult::RequiresAuth {
            message: "Server requires authentication but OAuth metadata not discoverable".into(),
            www_authenticate: challenge,
            tried: search.tried,
            hint: "The server may use a non-standard OAuth configuration. Check server documentation."
                .into(),
        });
    }

    Ok(DiscoveryResult::NotFound {
        message: "No OAuth metadata found at standard discovery endpoints".into(),
        tried: search.tried,
        hint: "The server may not use OAuth, or may use non-standard OAuth configuration.".into(),
    })
}

/// Request the server URL itself to see whether it demands authentication.
///
/// Returns `Some(www_authenticate)` on `401`/`403` (the inner value is `None`
/// when the header is missing or not valid text) and `None` for any other
/// status or a transport failure.
async fn challenge_server(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Option<Option<String>> {
    let response = match client
        .get(url)
        .header(ACCEPT, "application/json")
        .timeout(timeout)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            debug!(url, error = %e, "server probe failed");
            return None;
        }
    };

    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(
            response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        ),
        _ => None,
    }
}

/// Pick the authorization server base from a challenge: `issuer`, then
/// `authorization_uri`, then `realm`.
fn authorization_server_hint(www_authenticate: &str) -> Option<String> {
    ["issuer", "authorization_uri", "realm"]
        .into_iter()
        .find_map(|name| auth_param(www_authenticate, name))
}

/// Strip trailing slashes.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Scheme+host(+port) of a URL that has a non-root path.
fn root_url(url: &Url) -> Option<String> {
    let path = url.path();
    if path.is_empty() || path == "/" {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;

    use super::*;
    use crate::test_support::{serve, unreachable_url};

    const OAUTH_PATH: &str = "/.well-known/oauth-authorization-server";
    const OIDC_PATH: &str = "/.well-known/openid-configuration";

    fn metadata_json(authorization_endpoint: &str) -> serde_json::Value {
        json!({
            "issuer": "https://auth.example.com",
            "authorization_endpoint": authorization_endpoint,
            "token_endpoint": "https://auth.example.com/token",
            "scopes_supported": ["openid", "profile"],
            "response_types_supported": ["code"],
        })
    }

    fn unauthorized(header: String) -> Router {
        Router::new().fallback(move || {
            let header = header.clone();
            async move { (StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, header)], "") }
        })
    }

    async fn run(base: &str) -> DiscoveryResult {
        discover(&reqwest::Client::new(), base, &DiscoveryOptions::default())
            .await
            .unwrap()
    }

    #[test]
    fn normalize_strips_all_trailing_slashes() {
        assert_eq!(normalize_url("https://mcp.example.com///"), "https://mcp.example.com");
        assert_eq!(normalize_url("https://mcp.example.com/mcp"), "https://mcp.example.com/mcp");
    }

    #[test]
    fn root_url_only_for_non_root_paths() {
        let with_path = Url::parse("https://host.example.com:8443/mcp").unwrap();
        assert_eq!(
            root_url(&with_path).as_deref(),
            Some("https://host.example.com:8443")
        );
        assert!(root_url(&Url::parse("https://host.example.com/").unwrap()).is_none());
        assert!(root_url(&Url::parse("https://host.example.com").unwrap()).is_none());
    }

    #[test]
    fn hint_priority_is_issuer_then_authorization_uri_then_realm() {
        let all = r#"Bearer realm="https://realm", authorization_uri="https://authz", issuer="https://issuer""#;
        assert_eq!(authorization_server_hint(all).as_deref(), Some("https://issuer"));

        let no_issuer = r#"Bearer realm="https://realm", authorization_uri="https://authz""#;
        assert_eq!(authorization_server_hint(no_issuer).as_deref(), Some("https://authz"));

        let realm_only = r#"Bearer realm="https://realm""#;
        assert_eq!(authorization_server_hint(realm_only).as_deref(), Some("https://realm"));

        assert!(authorization_server_hint(r#"Bearer error="invalid_token""#).is_none());
    }

    #[test]
    fn document_without_authorization_endpoint_is_rejected() {
        let doc: MetadataDocument = serde_json::from_value(json!({ "issuer": "x" })).unwrap();
        assert!(doc.accept("https://x/.well-known/oauth-authorization-server").is_none());

        let empty: MetadataDocument =
            serde_json::from_value(json!({ "authorization_endpoint": "" })).unwrap();
        assert!(empty.accept("https://x").is_none());
    }

    #[test]
    fn document_defaults_advisory_lists() {
        let doc: MetadataDocument = serde_json::from_value(json!({
            "authorization_endpoint": "https://auth.example.com/authorize"
        }))
        .unwrap();
        let metadata = doc.accept("https://x/.well-known/openid-configuration").unwrap();
        assert!(metadata.issuer.is_none());
        assert!(metadata.token_endpoint.is_none());
        assert!(metadata.scopes_supported.is_empty());
        assert!(metadata.response_types_supported.is_empty());
        assert!(metadata.grant_types_supported.is_empty());
        assert_eq!(metadata.code_challenge_methods_supported, vec!["S256"]);
    }

    #[tokio::test]
    async fn first_matching_path_wins() {
        let app = Router::new()
            .route(OAUTH_PATH, get(|| async { axum::Json(metadata_json("https://auth.example.com/oauth-authorize")) }))
            .route(OIDC_PATH, get(|| async { axum::Json(metadata_json("https://auth.example.com/oidc-authorize")) }));
        let base = serve(app).await;

        let DiscoveryResult::Discovered(metadata) = run(&base).await else {
            panic!("expected discovered");
        };
        assert_eq!(metadata.discovery_url, format!("{base}{OAUTH_PATH}"));
        assert_eq!(
            metadata.authorization_endpoint,
            "https://auth.example.com/oauth-authorize"
        );
        assert_eq!(metadata.token_endpoint.as_deref(), Some("https://auth.example.com/token"));
        assert_eq!(metadata.scopes_supported, vec!["openid", "profile"]);
        assert!(metadata.discovered_via.is_none());
    }

    #[tokio::test]
    async fn trailing_slashes_are_normalized() {
        let app = Router::new().route(
            OAUTH_PATH,
            get(|| async { axum::Json(metadata_json("https://auth.example.com/authorize")) }),
        );
        let base = serve(app).await;

        let DiscoveryResult::Discovered(metadata) = run(&format!("{base}//")).await else {
            panic!("expected discovered");
        };
        assert_eq!(metadata.discovery_url, format!("{base}{OAUTH_PATH}"));
    }

    #[tokio::test]
    async fn falls_through_to_openid_configuration() {
        let app = Router::new()
            .route(OAUTH_PATH, get(|| async { "this is not json" }))
            .route(OIDC_PATH, get(|| async { axum::Json(metadata_json("https://auth.example.com/authorize")) }));
        let base = serve(app).await;

        let DiscoveryResult::Discovered(metadata) = run(&base).await else {
            panic!("expected discovered");
        };
        assert_eq!(metadata.discovery_url, format!("{base}{OIDC_PATH}"));
    }

    #[tokio::test]
    async fn document_missing_authorization_endpoint_is_skipped() {
        let app = Router::new()
            .route(OAUTH_PATH, get(|| async { axum::Json(json!({ "issuer": "https://auth.example.com" })) }))
            .route(OIDC_PATH, get(|| async { axum::Json(metadata_json("https://auth.example.com/authorize")) }));
        let base = serve(app).await;

        let DiscoveryResult::Discovered(metadata) = run(&base).await else {
            panic!("expected discovered");
        };
        assert_eq!(metadata.discovery_url, format!("{base}{OIDC_PATH}"));
    }

    #[tokio::test]
    async fn mistyped_advisory_fields_do_not_reject_document() {
        let app = Router::new().route(
            OAUTH_PATH,
            get(|| async {
                axum::Json(json!({
                    "authorization_endpoint": "https://auth.example.com/authorize",
                    "token_endpoint": 17,
                    "scopes_supported": "openid profile",
                    "grant_types_supported": {"authorization_code": true}
                }))
            }),
        );
        let base = serve(app).await;

        let metadata = match run(&base).await {
            DiscoveryResult::Discovered(metadata) => metadata,
            other => panic!("expected discovered, got {other:?}"),
        };
        assert_eq!(metadata.discovery_url, format!("{base}{OAUTH_PATH}"));
        assert_eq!(
            metadata.authorization_endpoint,
            "https://auth.example.com/authorize"
        );
        assert!(metadata.token_endpoint.is_none());
        assert_eq!(metadata.scopes_supported, vec!["openid", "profile"]);
        assert!(metadata.grant_types_supported.is_empty());
        assert_eq!(metadata.code_challenge_methods_supported, vec!["S256"]);
    }

    #[tokio::test]
    async fn sub_path_falls_back_to_root() {
        // Only the root serves metadata; /mcp/.well-known/* hits axum's 404 fallback
        let app = Router::new().route(
            OAUTH_PATH,
            get(|| async { axum::Json(metadata_json("https://auth.example.com/authorize")) }),
        );
        let base = serve(app).await;

        let DiscoveryResult::Discovered(metadata) = run(&format!("{base}/mcp")).await else {
            panic!("expected discovered via root fallback");
        };
        assert_eq!(metadata.discovery_url, format!("{base}{OAUTH_PATH}"));
        assert!(metadata.discovered_via.is_none());
    }

    #[tokio::test]
    async fn www_authenticate_issuer_redirects_discovery() {
        let auth_server = serve(Router::new().route(
            OAUTH_PATH,
            get(|| async { axum::Json(metadata_json("https://auth.example.com/authorize")) }),
        ))
        .await;
        let resource = serve(unauthorized(format!(r#"Bearer issuer="{auth_server}/""#))).await;

        let DiscoveryResult::Discovered(metadata) = run(&format!("{resource}/mcp")).await else {
            panic!("expected discovered via WWW-Authenticate");
        };
        assert_eq!(metadata.discovery_url, format!("{auth_server}{OAUTH_PATH}"));
        assert_eq!(metadata.discovered_via.as_deref(), Some("www-authenticate-header"));
    }

    #[tokio::test]
    async fn unresolvable_challenge_reports_requires_auth_with_tried_list() {
        // The realm points back at the resource root, whose candidates were
        // already tried, so no new URLs are requested.
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let resource = format!("http://{}", listener.local_addr().unwrap());
        let header = format!(r#"Bearer realm="{resource}""#);
        let app = Router::new().fallback(move || {
            let header = header.clone();
            counter.fetch_add(1, Ordering::SeqCst);
            async move { (StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, header)], "") }
        });
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let (www_authenticate, tried) = match run(&format!("{resource}/mcp")).await {
            DiscoveryResult::RequiresAuth {
                www_authenticate,
                tried,
                ..
            } => (www_authenticate, tried),
            other => panic!("expected requires_auth, got {other:?}"),
        };
        assert_eq!(www_authenticate, Some(format!(r#"Bearer realm="{resource}""#)));
        assert_eq!(
            tried,
            vec![
                format!("{resource}/mcp{OAUTH_PATH}"),
                format!("{resource}/mcp{OIDC_PATH}"),
                format!("{resource}{OAUTH_PATH}"),
                format!("{resource}{OIDC_PATH}"),
            ]
        );
        // four candidates plus the challenge probe
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn forbidden_without_header_still_requires_auth() {
        let resource = serve(Router::new().fallback(|| async { StatusCode::FORBIDDEN })).await;

        let (www_authenticate, tried) = match run(&resource).await {
            DiscoveryResult::RequiresAuth {
                www_authenticate,
                tried,
                ..
            } => (www_authenticate, tried),
            other => panic!("expected requires_auth, got {other:?}"),
        };
        assert!(www_authenticate.is_none());
        assert_eq!(tried.len(), 2);
    }

    #[tokio::test]
    async fn nothing_found_reports_not_found() {
        let base = serve(Router::new()).await;

        let tried = match run(&base).await {
            DiscoveryResult::NotFound { tried, .. } => tried,
            other => panic!("expected not_found, got {other:?}"),
        };
        assert_eq!(
            tried,
            vec![format!("{base}{OAUTH_PATH}"), format!("{base}{OIDC_PATH}")]
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_not_found_not_error() {
        let base = unreachable_url().await;

        let tried = match run(&format!("{base}/mcp")).await {
            DiscoveryResult::NotFound { tried, .. } => tried,
            other => panic!("expected not_found, got {other:?}"),
        };
        assert_eq!(tried.len(), 4);
    }

    #[tokio::test]
    async fn invalid_server_url_is_caller_error() {
        let client = reqwest::Client::new();
        let options = DiscoveryOptions::default();

        let err = discover(&client, "not a url", &options).await.unwrap_err();
        assert!(err.is_caller_error());

        let err = discover(&client, "ftp://files.example.com", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn discovered_result_serializes_with_status_tag() {
        let result = DiscoveryResult::Discovered(DiscoveredMetadata {
            issuer: Some("https://auth.example.com".into()),
            authorization_endpoint: "https://auth.example.com/authorize".into(),
            token_endpoint: Some("https://auth.example.com/token".into()),
            registration_endpoint: None,
            scopes_supported: vec![],
            response_types_supported: vec!["code".into()],
            grant_types_supported: vec![],
            code_challenge_methods_supported: vec!["S256".into()],
            discovery_url: "https://auth.example.com/.well-known/oauth-authorization-server".into(),
            discovered_via: None,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "discovered");
        assert_eq!(json["authorization_endpoint"], "https://auth.example.com/authorize");
        assert!(json["registration_endpoint"].is_null());
        assert!(json.get("discovered_via").is_none());
    }
}
