//! Console commands
//!
//! Each command writes its result to stdout; diagnostics go through tracing
//! to stderr.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Subcommand;
use registry_client::ApiClient;
use reqwest::Method;
use tracing::info;

use crate::config::Config;
use crate::error::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session's tokens
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in officer's profile
    Whoami,
    /// Show the stored access token's claims and time to expiry
    Status,
    /// Send an authenticated request, e.g. `request GET /officers/`
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
}

pub async fn run(
    command: Command,
    client: &ApiClient,
    config: &Config,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = email
                .or_else(|| config.session.email.clone())
                .ok_or(Error::MissingEmail)?;
            let password = config
                .session
                .password
                .as_ref()
                .ok_or(Error::MissingPassword)?;
            client.login(&email, password).await?;
            writeln!(out, "logged in as {email}")?;
        }
        Command::Logout => {
            client.logout().await?;
            writeln!(out, "logged out")?;
        }
        Command::Whoami => {
            let user = client.check_session().await?;
            writeln!(out, "{}", user.display_name())?;
            if let Some(role) = &user.role {
                writeln!(out, "role: {role}")?;
            }
            if !user.allowed_area_codes.is_empty() {
                writeln!(out, "areas: {}", user.allowed_area_codes.join(", "))?;
            }
        }
        Command::Status => status(client, out).await?,
        Command::Request { method, path, data } => {
            let method = parse_method(&method)?;
            let body = data.as_deref().map(parse_body).transpose()?;
            info!(%method, path = %path, "sending request");
            let response = client.request(method, &path, body.as_ref()).await?;
            writeln!(out, "{}", pretty(response.body()))?;
        }
    }
    Ok(())
}

async fn status(client: &ApiClient, out: &mut impl Write) -> Result<()> {
    let Some(access) = client.credentials().access_token().await else {
        writeln!(out, "not logged in")?;
        return Ok(());
    };

    let claims = registry_auth::decode_claims(&access).context("decoding stored access token")?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    if let Some(user_id) = &claims.user_id {
        writeln!(out, "user: {user_id}")?;
    }
    match claims.expires_in(now) {
        None => writeln!(out, "access token has no expiry")?,
        Some(_) if claims.is_expired(now) => {
            writeln!(out, "access token expired (refreshed on next request)")?
        }
        Some(left) => writeln!(out, "access token expires in {}s", left.as_secs())?,
    }
    let has_refresh = client.credentials().refresh_token().await.is_some();
    writeln!(
        out,
        "refresh token: {}",
        if has_refresh { "stored" } else { "missing" }
    )?;
    Ok(())
}

fn parse_method(method: &str) -> crate::error::Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidMethod(method.to_string()))
}

fn parse_body(data: &str) -> crate::error::Result<serde_json::Value> {
    serde_json::from_str(data).map_err(|e| Error::InvalidBody(e.to_string()))
}

/// Re-indent JSON bodies; anything else is printed as received.
fn pretty(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}
