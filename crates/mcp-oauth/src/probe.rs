//! Auth requirement probe
//!
//! Sends one request to a protected resource and classifies the answer:
//! reachable, needs authentication, or some other failure. When auth is
//! required, a chain of extractors looks for an authorization URL in the
//! places servers actually put one (standard or not). The first extractor
//! that finds something wins.

use std::time::Duration;

use common::Secret;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, LINK, WWW_AUTHENTICATE,
};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::challenge::{auth_param, is_bearer, link_with_rel};
use crate::constants::{PROBE_ACCEPT, PROBE_TIMEOUT};
use crate::error::{Error, Result};

/// Probe request settings.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Defaults to `OPTIONS`. Some servers answer `OPTIONS` with `405`
    /// regardless of auth; that lands in [`ProbeResult::Error`].
    pub method: Method,
    /// Sent verbatim as the `Authorization` header.
    pub auth_header: Option<Secret<String>>,
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            method: Method::OPTIONS,
            auth_header: None,
            timeout: PROBE_TIMEOUT,
        }
    }
}

/// Outcome of a probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProbeResult {
    Available { message: String },
    RequiresAuth(AuthRequirement),
    /// Any non-2xx status other than 401/403.
    Error { http_status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequirement {
    pub auth_type: String,
    pub http_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// What the extractors get to look at.
struct ChallengeResponse {
    headers: HeaderMap,
    /// Parsed body, present only for JSON content types that parsed cleanly.
    body: Option<Value>,
}

type Extractor = fn(&ChallengeResponse) -> Option<String>;

/// Header extractors, in priority order. The body is consulted after these.
const HEADER_EXTRACTORS: [Extractor; 2] = [from_www_authenticate, from_link_header];

/// `authorization_uri`, else `realm`, from `WWW-Authenticate`.
fn from_www_authenticate(response: &ChallengeResponse) -> Option<String> {
    let header = header_str(&response.headers, WWW_AUTHENTICATE)?;
    auth_param(header, "authorization_uri").or_else(|| auth_param(header, "realm"))
}

/// `Link: <...>; rel="oauth2-authorize"`.
fn from_link_header(response: &ChallengeResponse) -> Option<String> {
    link_with_rel(header_str(&response.headers, LINK)?, "oauth2-authorize")
}

/// Common body fields used by MCP gateways that skip the standard headers.
fn from_json_body(response: &ChallengeResponse) -> Option<String> {
    let body = response.body.as_ref()?;
    ["authUrl", "auth_url", "authorization_url"]
        .into_iter()
        .find_map(|key| non_empty_str(body.get(key)))
        .or_else(|| {
            let oauth = body.get("oauth")?;
            ["authorize_url", "authUrl"]
                .into_iter()
                .find_map(|key| non_empty_str(oauth.get(key)))
        })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Probe `resource_url` once and classify the response.
///
/// Returns `Err` for caller input problems and for transport failures; a
/// timeout is reported as [`Error::Timeout`].
pub async fn probe(
    client: &reqwest::Client,
    resource_url: &str,
    options: &ProbeOptions,
) -> Result<ProbeResult> {
    let url = Url::parse(resource_url.trim())
        .map_err(|e| Error::InvalidInput(format!("invalid resource URL {resource_url:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "resource URL must use http or https, got {}",
            url.scheme()
        )));
    }

    let mut request = client
        .request(options.method.clone(), url.clone())
        .header(ACCEPT, PROBE_ACCEPT)
        .header(CONTENT_TYPE, "application/json")
        .timeout(options.timeout);

    if let Some(auth) = &options.auth_header {
        let value = HeaderValue::from_str(auth.expose())
            .map_err(|_| Error::InvalidInput("auth header contains invalid characters".into()))?;
        request = request.header(AUTHORIZATION, value);
    }

    debug!(url = %url, method = %options.method, "probing resource");
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout("Connection timeout - server may be unavailable".into())
        } else {
            Error::Http(format!("probe request failed: {e}"))
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(ProbeResult::Available {
            message: "MCP server is accessible".into(),
        });
    }

    if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
        return Ok(ProbeResult::Error {
            http_status: status.as_u16(),
            message: format!(
                "Server returned {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ),
        });
    }

    let headers = response.headers().clone();
    let is_json = header_str(&headers, CONTENT_TYPE).is_some_and(|ct| ct.contains("json"));
    let body = if is_json {
        match response.json::<Value>().await {
            Ok(v) => Some(v),
            Err(e) if e.is_timeout() => {
                return Err(Error::Timeout(
                    "Connection timeout - server may be unavailable".into(),
                ));
            }
            Err(e) => {
                debug!(error = %e, "ignoring unparseable JSON body");
                None
            }
        }
    } else {
        None
    };

    let requirement = classify_challenge(status, &ChallengeResponse { headers, body });
    info!(
        status = requirement.http_status,
        auth_type = %requirement.auth_type,
        found_auth_url = requirement.auth_url.is_some(),
        "resource requires authentication"
    );
    Ok(ProbeResult::RequiresAuth(requirement))
}

/// Build the `requires_auth` outcome for a 401/403 response.
fn classify_challenge(status: StatusCode, response: &ChallengeResponse) -> AuthRequirement {
    let mut auth_type = match header_str(&response.headers, WWW_AUTHENTICATE) {
        Some(h) if is_bearer(h) => "oauth2-bearer",
        _ => "oauth",
    }
    .to_string();

    let mut auth_url = HEADER_EXTRACTORS
        .iter()
        .find_map(|extract| extract(response));

    // Gateways that describe auth in the body may also name its type there
    if auth_url.is_none() {
        if let Some(body) = &response.body {
            auth_url = from_json_body(response);
            if let Some(t) = non_empty_str(body.get("authType"))
                .or_else(|| non_empty_str(body.get("auth_type")))
            {
                auth_type = t;
            }
        }
    }

    let mut message = if status == StatusCode::UNAUTHORIZED {
        "Authentication required".to_string()
    } else {
        "Access forbidden - authorization required".to_string()
    };
    let hint = if auth_url.is_none() {
        message.push_str(". No OAuth discovery URL found in response headers or body.");
        Some(
            "The server requires authentication but did not provide an OAuth authorization URL. \
             Check the server documentation for authentication instructions."
                .to_string(),
        )
    } else {
        None
    };

    AuthRequirement {
        auth_type,
        http_status: status.as_u16(),
        auth_url,
        message,
        hint,
    }
}
