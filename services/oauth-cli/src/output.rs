//! JSON result rendering and exit codes
//!
//! Each invocation prints exactly one JSON object to stdout. The exit code
//! tells a calling agent how to react without parsing the body:
//! 0 for success and non-fatal outcomes, 1 for network or upstream
//! failures, 2 for caller input errors.

use std::process::ExitCode;

use mcp_oauth::{AuthorizationRequest, DiscoveryResult, ProbeResult, TokenResult};
use serde::Serialize;
use serde_json::{Value, json};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;

const NEXT_STEPS: [&str; 4] = [
    "1. Direct user to authorization_url",
    "2. User authenticates and is redirected to redirect_uri with ?code=...&state=...",
    "3. Verify state matches the value above",
    "4. Exchange code for token using code_verifier (see the exchange command)",
];

/// A rendered result and the exit code that goes with it.
#[derive(Debug)]
pub struct Outcome {
    pub body: Value,
    pub exit_code: u8,
}

impl Outcome {
    fn new(body: Value, exit_code: u8) -> Self {
        Self { body, exit_code }
    }

    /// Print the body to stdout and return the process exit code.
    pub fn emit(self) -> ExitCode {
        match serde_json::to_string_pretty(&self.body) {
            Ok(text) => println!("{text}"),
            Err(e) => println!(r#"{{"status":"error","kind":"internal","message":"{e}"}}"#),
        }
        ExitCode::from(self.exit_code)
    }
}

fn to_value<T: Serialize>(value: &T) -> serde_json::Result<Value> {
    serde_json::to_value(value)
}

/// Every discovery outcome is non-fatal: `not_found` and `requires_auth`
/// are answers, not failures.
pub fn discovery(result: &DiscoveryResult) -> serde_json::Result<Outcome> {
    Ok(Outcome::new(to_value(result)?, EXIT_OK))
}

/// Every probe outcome, including a non-auth HTTP error, exits 0.
pub fn probe(result: &ProbeResult) -> serde_json::Result<Outcome> {
    Ok(Outcome::new(to_value(result)?, EXIT_OK))
}

pub fn authorization(request: &AuthorizationRequest) -> serde_json::Result<Outcome> {
    let mut body = to_value(request)?;
    if let Value::Object(map) = &mut body {
        map.insert("status".into(), json!("success"));
        map.insert("next_steps".into(), json!(NEXT_STEPS));
    }
    Ok(Outcome::new(body, EXIT_OK))
}

/// Success carries a `usage` block with the ready-to-send header. A token
/// endpoint error exits 1.
pub fn token(result: &TokenResult) -> serde_json::Result<Outcome> {
    let mut body = to_value(result)?;
    let exit_code = match result {
        TokenResult::Success(tokens) => {
            if let Value::Object(map) = &mut body {
                map.insert(
                    "usage".into(),
                    json!({
                        "header": format!("Authorization: {}", tokens.authorization_header()),
                        "note": "Include this header in requests to the MCP server",
                    }),
                );
            }
            EXIT_OK
        }
        TokenResult::Error(_) => EXIT_FAILURE,
    };
    Ok(Outcome::new(body, exit_code))
}

/// Render a library error. Caller input problems exit 2, everything else 1.
pub fn error(err: &mcp_oauth::Error) -> Outcome {
    let mut body = json!({
        "status": "error",
        "kind": err.kind(),
        "message": err.to_string(),
    });
    if let mcp_oauth::Error::MissingParameters(missing) = err {
        body["missing"] = json!(missing);
    }
    let exit_code = if err.is_caller_error() {
        EXIT_USAGE
    } else {
        EXIT_FAILURE
    };
    Outcome::new(body, exit_code)
}

/// A bad or unreadable config file is a caller problem.
pub fn config_error(err: &common::Error) -> Outcome {
    Outcome::new(
        json!({
            "status": "error",
            "kind": "config",
            "message": err.to_string(),
        }),
        EXIT_USAGE,
    )
}

/// Failures outside the OAuth operations themselves.
pub fn internal_error(err: &anyhow::Error) -> Outcome {
    Outcome::new(
        json!({
            "status": "error",
            "kind": "internal",
            "message": format!("{err:#}"),
        }),
        EXIT_FAILURE,
    )
}
