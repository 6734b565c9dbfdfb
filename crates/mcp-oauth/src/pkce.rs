//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the OAuth
//! authorization flow, plus the opaque `state` value. The verifier stays with
//! the caller until the token exchange; the challenge goes into the
//! authorization URL so the authorization server can verify the exchange
//! request came from the same party that initiated the flow.
//!
//! Randomness comes from the thread-local CSPRNG, seeded from the operating
//! system. If the OS entropy source is unavailable the RNG panics; there is no
//! fallback to a weaker generator.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::{Secret, serialize_exposed};
use rand::RngExt;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::constants::{CODE_CHALLENGE_METHOD, DEFAULT_STATE_BYTES, DEFAULT_VERIFIER_BYTES};
use crate::error::{Error, Result};

/// Verifier entropy bounds. RFC 7636 allows 43-128 characters; 32 bytes
/// encode to 43 and 96 bytes to 128.
const MIN_VERIFIER_BYTES: usize = 32;
const MAX_VERIFIER_BYTES: usize = 96;

/// A PKCE verifier/challenge pair.
///
/// Immutable once built. The verifier is wrapped in [`Secret`] so `Debug`
/// output never leaks it; it is only exposed when serialized into a result
/// object the caller explicitly requested, or sent in the token request body.
#[derive(Debug, Clone, Serialize)]
pub struct PkcePair {
    #[serde(serialize_with = "serialize_exposed")]
    code_verifier: Secret<String>,
    code_challenge: String,
    #[serde(rename = "code_challenge_method")]
    method: &'static str,
}

impl PkcePair {
    /// Generate a fresh pair from 32 random bytes.
    pub fn generate() -> Self {
        Self::from_verifier(random_url_safe(DEFAULT_VERIFIER_BYTES))
    }

    /// Build a pair around an existing verifier, deriving its challenge.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let code_challenge = derive_challenge(&verifier);
        Self {
            code_verifier: Secret::new(verifier),
            code_challenge,
            method: CODE_CHALLENGE_METHOD,
        }
    }

    pub fn code_verifier(&self) -> &Secret<String> {
        &self.code_verifier
    }

    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    /// Always `S256`.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Recompute the challenge from the stored verifier and compare.
    pub fn verify(&self) -> bool {
        derive_challenge(self.code_verifier.expose()) == self.code_challenge
    }
}

/// Generate a cryptographically random PKCE code verifier.
///
/// `length` is the number of random bytes, not characters. Values outside
/// 32..=96 would produce a verifier outside the RFC 7636 43-128 character
/// range and are rejected.
pub fn generate_verifier(length: usize) -> Result<String> {
    if !(MIN_VERIFIER_BYTES..=MAX_VERIFIER_BYTES).contains(&length) {
        return Err(Error::InvalidInput(format!(
            "verifier length must be between {MIN_VERIFIER_BYTES} and {MAX_VERIFIER_BYTES} bytes, got {length}"
        )));
    }
    Ok(random_url_safe(length))
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`, hashed over the verifier's
/// exact UTF-8 bytes.
pub fn derive_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate an opaque `state` value from `length` random bytes.
pub fn generate_state(length: usize) -> String {
    random_url_safe(length)
}

/// Generate a `state` value with the default 16 bytes of entropy.
pub fn default_state() -> String {
    generate_state(DEFAULT_STATE_BYTES)
}

/// URL-safe base64 (no padding) of `length` random bytes.
fn random_url_safe(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}
