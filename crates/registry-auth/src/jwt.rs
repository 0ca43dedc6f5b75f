//! Access token claim decoding
//!
//! Reads the payload segment of a JWT without verifying its signature. The
//! backend remains the authority on validity; this is only for showing who
//! is logged in and when the token lapses.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Claims carried by a registry access token.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry, unix seconds
    #[serde(default)]
    pub exp: Option<u64>,
    /// Issued at, unix seconds
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub jti: Option<String>,
    /// "access" or "refresh"
    #[serde(default)]
    pub token_type: Option<String>,
    /// Numeric or UUID depending on the backend's user model
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Time left before expiry at `now` (unix seconds). `None` when the token
    /// has no `exp` claim; zero once expired.
    pub fn expires_in(&self, now: u64) -> Option<Duration> {
        self.exp.map(|exp| Duration::from_secs(exp.saturating_sub(now)))
    }

    /// Tokens without an `exp` claim never expire client-side.
    pub fn is_expired(&self, now: u64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

/// Decode the claims of a compact-serialized JWT.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if segments.next().is_none() => payload,
        _ => {
            return Err(Error::MalformedToken(
                "expected three dot-separated segments".into(),
            ));
        }
    };

    // Some issuers pad the payload even though the JWS format forbids it
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("payload is not a JSON object: {e}")))
}
