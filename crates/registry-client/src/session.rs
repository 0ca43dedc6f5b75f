//! Session lifecycle signal
//!
//! Broadcasts login, refresh and logout to whoever is listening (the console
//! prompts for a fresh login when it sees `LoggedOut`). Sending with no
//! subscribers is not an error.

use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// The refresh endpoint rejected us, timed out, or no refresh token was stored
    RefreshFailed(String),
    UserRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut { reason: LogoutReason },
}

/// Cloneable handle to the session event channel.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        let receivers = self.tx.send(event.clone()).unwrap_or(0);
        debug!(?event, receivers, "session event");
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
