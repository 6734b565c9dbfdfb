//! Authorization code exchange
//!
//! Redeems the code captured from the redirect, together with the PKCE
//! verifier, at the token endpoint. Public clients send `client_id` in the
//! form body; confidential clients authenticate with HTTP Basic and leave it
//! out of the body.
//!
//! A non-2xx answer from the token endpoint is a [`TokenResult::Error`]
//! carrying the upstream `error` code verbatim, not a Rust error: the caller
//! needs the code to decide whether to restart the flow.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::Secret;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::TOKEN_TIMEOUT;
use crate::error::{Error, Result};
use crate::lenient;

const INVALID_CLIENT_HINT: &str = "The OAuth server rejected the client credentials. If using a confidential client, make sure to provide --client-secret or set OAUTH_CLIENT_SECRET environment variable.";
const INVALID_GRANT_HINT: &str =
    "The authorization code may have expired or already been used. Start the OAuth flow again.";

/// Inputs for an authorization code exchange.
///
/// Every field is optional at the type level so that all missing values can
/// be reported together in one [`Error::MissingParameters`].
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    pub code: Option<String>,
    pub code_verifier: Option<Secret<String>>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    /// Present for confidential clients only.
    pub client_secret: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct ExchangeOptions {
    pub timeout: Duration,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            timeout: TOKEN_TIMEOUT,
        }
    }
}

/// Outcome of a token exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TokenResult {
    Success(TokenSet),
    Error(TokenError),
}

/// Tokens issued by the authorization server.
///
/// `Debug` redacts every token; serialization does not, since the serialized
/// form is what the caller asked for.
#[derive(Clone, PartialEq, Serialize)]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenSet {
    /// Value for the `Authorization` header on requests to the resource.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { Some("[REDACTED]") } else { None };
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &redact(self.refresh_token.is_some()))
            .field("scope", &self.scope)
            .field("id_token", &redact(self.id_token.is_some()))
            .finish()
    }
}

/// An OAuth error response from the token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenError {
    pub http_status: u16,
    pub error: String,
    pub error_description: String,
    pub hint: Option<String>,
}

/// Success body as sent by the token endpoint. Everything optional so a
/// missing `access_token` gets a precise message instead of a serde one, and
/// a mistyped informational field never hides a token that was issued.
#[derive(Deserialize)]
struct TokenResponseBody {
    #[serde(default, deserialize_with = "lenient::string")]
    access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::seconds")]
    expires_in: Option<u64>,
    #[serde(default, deserialize_with = "lenient::string")]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    scope: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    id_token: Option<String>,
}

impl TokenResponseBody {
    fn into_token_set(self, now: DateTime<Utc>) -> Result<TokenSet> {
        let access_token = non_empty(self.access_token).ok_or_else(|| {
            Error::UpstreamProtocol("token response is missing access_token".into())
        })?;
        let expires_at = self.expires_in.and_then(|secs| {
            let secs = i64::try_from(secs).ok()?;
            now.checked_add_signed(TimeDelta::try_seconds(secs)?)
        });

        Ok(TokenSet {
            access_token,
            token_type: non_empty(self.token_type).unwrap_or_else(|| "Bearer".into()),
            expires_in: self.expires_in,
            expires_at,
            refresh_token: non_empty(self.refresh_token),
            scope: non_empty(self.scope),
            id_token: non_empty(self.id_token),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn non_empty_secret(value: Option<&Secret<String>>) -> Option<&str> {
    value
        .filter(|s| !s.is_empty())
        .map(|s| s.expose().as_str())
}

/// Exchange an authorization code for tokens.
///
/// Missing inputs are all reported together before any request is sent.
/// Transport failures and timeouts are `Err`; an OAuth error response from
/// the endpoint is `Ok(TokenResult::Error)`.
pub async fn exchange(
    client: &reqwest::Client,
    token_endpoint: &str,
    request: &TokenRequest,
    options: &ExchangeOptions,
) -> Result<TokenResult> {
    let code = request.code.as_deref().filter(|s| !s.is_empty());
    let verifier = non_empty_secret(request.code_verifier.as_ref());
    let client_id = request.client_id.as_deref().filter(|s| !s.is_empty());
    let redirect_uri = request.redirect_uri.as_deref().filter(|s| !s.is_empty());

    let (Some(code), Some(verifier), Some(client_id), Some(redirect_uri)) =
        (code, verifier, client_id, redirect_uri)
    else {
        let missing = [
            ("code", code.is_none()),
            ("code_verifier", verifier.is_none()),
            ("client_id", client_id.is_none()),
            ("redirect_uri", redirect_uri.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        return Err(Error::MissingParameters(missing));
    };

    let url = Url::parse(token_endpoint.trim()).map_err(|e| {
        Error::InvalidInput(format!("invalid token endpoint {token_endpoint:?}: {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "token endpoint must use http or https, got {}",
            url.scheme()
        )));
    }

    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("code_verifier", verifier),
    ];

    let mut builder = client
        .post(url.clone())
        .header(ACCEPT, "application/json")
        .timeout(options.timeout);

    let confidential = match non_empty_secret(request.client_secret.as_ref()) {
        Some(secret) => {
            builder = builder.basic_auth(client_id, Some(secret));
            true
        }
        None => {
            form.push(("client_id", client_id));
            false
        }
    };

    debug!(url = %url, confidential, "exchanging authorization code");
    let response = builder.form(&form).send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout("Token exchange request timed out".into())
        } else {
            Error::Http(format!("token exchange request failed: {e}"))
        }
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout("Token exchange request timed out".into())
        } else {
            Error::Http(format!("failed to read token response: {e}"))
        }
    })?;

    if !status.is_success() {
        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let error = field("error").unwrap_or_else(|| "unknown_error".into());
        let error_description = field("error_description")
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
        let hint = match error.as_str() {
            "invalid_client" => Some(INVALID_CLIENT_HINT.to_string()),
            "invalid_grant" => Some(INVALID_GRANT_HINT.to_string()),
            _ => None,
        };

        warn!(status = status.as_u16(), error = %error, "token endpoint returned an error");
        return Ok(TokenResult::Error(TokenError {
            http_status: status.as_u16(),
            error,
            error_description,
            hint,
        }));
    }

    let parsed: TokenResponseBody = serde_json::from_str(&body)
        .map_err(|e| Error::UpstreamProtocol(format!("invalid token response: {e}")))?;
    let tokens = parsed.into_token_set(Utc::now())?;

    info!(
        token_type = %tokens.token_type,
        expires_in = ?tokens.expires_in,
        has_refresh_token = tokens.refresh_token.is_some(),
        "authorization code exchanged"
    );
    Ok(TokenResult::Success(tokens))
}
