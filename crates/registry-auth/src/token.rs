//! Token endpoint calls: login and refresh
//!
//! Both go straight through the plain `reqwest::Client`, never through the
//! authenticated client, so a failing refresh can't recurse into another
//! refresh.

use common::Secret;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::constants::{LOGIN_PATH, REFRESH_PATH};
use crate::credentials::TokenPair;
use crate::error::{Error, Result};

/// Response from the refresh endpoint.
///
/// Servers with refresh-token rotation enabled also return a new `refresh`.
#[derive(Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_access(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<RefreshResponse> {
    let url = format!("{base_url}{REFRESH_PATH}");
    debug!(%url, "requesting access token refresh");

    let response = client
        .post(&url)
        .json(&json!({ "refresh": refresh }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let response = check_status(response, "token refresh").await?;
    response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::TokenEndpoint(format!("invalid refresh response: {e}")))
}

/// Log in with email and password, returning a fresh token pair.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &Secret<String>,
) -> Result<TokenPair> {
    let url = format!("{base_url}{LOGIN_PATH}");
    debug!(%url, email, "logging in");

    let response = client
        .post(&url)
        .json(&json!({ "email": email, "password": password.expose() }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let response = check_status(response, "login").await?;
    response
        .json::<TokenPair>()
        .await
        .map_err(|e| Error::TokenEndpoint(format!("invalid login response: {e}")))
}

/// 401/403 mean the submitted credentials are rejected; any other failure
/// status is a token endpoint error.
async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(Error::InvalidCredentials(format!(
            "{what} rejected ({status}): {body}"
        )));
    }

    Err(Error::TokenEndpoint(format!(
        "{what} returned {status}: {body}"
    )))
}
