//! Civil Registry Console
//!
//! Command-line client for the civil registry REST API:
//! 1. Loads config (TOML file + environment overrides)
//! 2. Opens the persisted credential store
//! 3. Runs one command through the authenticated client
//! 4. Reports if the session ended while the command ran

mod commands;
mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use registry_auth::CredentialStore;
use registry_client::{ApiClient, LogoutReason, SessionEvent};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Command;
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "registry-cli", version, about = "Console client for the civil registry API")]
struct Cli {
    /// Path to the TOML config file (falls back to CONFIG_PATH, then ./registry-cli.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr keep stdout for command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    debug!(path = %config_path.display(), exists = config_path.exists(), "loading configuration");
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        token_file = %config.session.token_file.display(),
        timeout_secs = config.api.timeout_secs,
        refresh_timeout_secs = config.api.refresh_timeout_secs,
        "configuration loaded"
    );

    let store = CredentialStore::load(config.session.token_file.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open credential store {}",
                config.session.token_file.display()
            )
        })?;

    let client = ApiClient::builder()
        .base_url(config.api.base_url.clone())
        .credentials(Arc::new(store))
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .refresh_timeout(Duration::from_secs(config.api.refresh_timeout_secs))
        .build()
        .context("failed to build API client")?;

    let mut session_events = client.events().subscribe();
    let result = commands::run(cli.command, &client, &config, &mut std::io::stdout()).await;
    report_session_end(&mut session_events);
    result
}

/// Tell the user to log in again if a refresh failed during the command.
/// Returns whether it did.
fn report_session_end(events: &mut broadcast::Receiver<SessionEvent>) -> bool {
    let mut expired = false;
    loop {
        match events.try_recv() {
            Ok(SessionEvent::LoggedOut {
                reason: LogoutReason::RefreshFailed(reason),
            }) => {
                warn!(%reason, "session expired");
                eprintln!("session expired ({reason}); run `registry-cli login` to sign in again");
                expired = true;
            }
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "session events lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return expired,
        }
    }
}
