//! Account operations: login, logout, current user, session check

use common::Secret;
use registry_auth::ME_PATH;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::session::{LogoutReason, SessionEvent};

/// Profile of the logged-in officer, from `GET /accounts/me/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct User {
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Admin-unit codes this officer may act in
    #[serde(default)]
    pub allowed_area_codes: Vec<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone().unwrap_or_else(|| "<unknown>".into())
        } else {
            name
        }
    }
}

impl ApiClient {
    /// Exchange email and password for a token pair and store it.
    pub async fn login(&self, email: &str, password: &Secret<String>) -> Result<()> {
        let pair = registry_auth::login(&self.http, &self.base_url, email, password).await?;
        self.store.set_tokens(pair).await?;
        info!(email, "logged in");
        self.events.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Drop both tokens and tell listeners the session is over.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await?;
        info!("logged out");
        self.events.emit(SessionEvent::LoggedOut {
            reason: LogoutReason::UserRequested,
        });
        Ok(())
    }

    pub async fn current_user(&self) -> Result<User> {
        self.get_json(ME_PATH).await
    }

    /// Validate the stored session by fetching the current user.
    ///
    /// Missing either token clears both. A 401 that survives a refresh also
    /// clears them; transport and server errors leave the session alone.
    pub async fn check_session(&self) -> Result<User> {
        if self.store.tokens().await.is_none() {
            self.store.clear().await?;
            return Err(Error::NotAuthenticated("no stored session".into()));
        }

        match self.current_user().await {
            Err(Error::Unauthorized(body)) => {
                self.store.clear().await?;
                Err(Error::Unauthorized(body))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_parses_partial_profile() {
        let user: User = serde_json::from_str(
            r#"{"user_id":"7c9e","email":"officer@registry.go","role":"registrar"}"#,
        )
        .unwrap();
        assert_eq!(user.role.as_deref(), Some("registrar"));
        assert!(user.allowed_area_codes.is_empty());
    }

    #[test]
    fn display_name_prefers_full_name() {
        let user = User {
            first_name: Some("Amina".into()),
            last_name: Some("Odhiambo".into()),
            email: Some("amina@registry.go".into()),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "Amina Odhiambo");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let user = User {
            email: Some("amina@registry.go".into()),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "amina@registry.go");
        assert_eq!(User::default().display_name(), "<unknown>");
    }
}
