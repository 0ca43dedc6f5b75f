//! Console errors
//!
//! Failures from the API client and config loading travel as their own
//! types inside `anyhow`; these cover mistakes in how the console was invoked.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no email given: pass --email or set session.email in the config file")]
    MissingEmail,

    #[error("no password available: set REGISTRY_PASSWORD or session.password_file")]
    MissingPassword,

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("--data is not valid JSON: {0}")]
    InvalidBody(String),
}

pub type Result<T> = std::result::Result<T, Error>;
