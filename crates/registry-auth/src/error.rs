//! Error types for registry authentication

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("token endpoint error: {0}")]
    TokenEndpoint(String),

    #[error("no refresh token stored")]
    NoRefreshToken,

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;
