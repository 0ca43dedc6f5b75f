//! Registry account authentication
//!
//! Token types, the persisted credential store, the two token endpoint calls
//! (login and refresh) and JWT claim decoding. The authenticated request flow
//! built on top of these lives in `registry-client`.
//!
//! Credential flow:
//! 1. `token::login()` exchanges email + password for a `TokenPair`
//! 2. The pair is saved via `credentials::CredentialStore::set_tokens()`
//! 3. On a 401, `token::refresh_access()` trades the refresh token for a new access token
//! 4. The new access token is saved via `credentials::CredentialStore::set_access()`
//! 5. On refresh failure or logout, `credentials::CredentialStore::clear()` drops both

pub mod constants;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialStore, TokenPair};
pub use error::{Error, Result};
pub use jwt::{Claims, decode_claims};
pub use token::{RefreshResponse, login, refresh_access};
