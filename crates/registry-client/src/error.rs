//! Error types for authenticated API calls

/// Errors surfaced to callers of `ApiClient`.
///
/// A 401 that was recovered by a refresh never shows up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    /// 401 on the replayed request, after a successful refresh
    #[error("unauthorized after token refresh: {0}")]
    Unauthorized(String),

    /// The session ended: credentials were cleared and logout was signalled
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid request path: {0}")]
    InvalidPath(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// Login, credential storage, or token decoding
    #[error("authentication error: {0}")]
    Auth(#[from] registry_auth::Error),

    #[error("invalid client configuration: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether this error ends the session (the caller should log in again).
    pub fn is_session_ended(&self) -> bool {
        matches!(
            self,
            Error::RefreshFailed(_) | Error::Unauthorized(_) | Error::NotAuthenticated(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
