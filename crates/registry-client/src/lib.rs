//! Authenticated client for the civil registry REST API
//!
//! Every request carries the stored access token as a bearer credential. A
//! 401 triggers one refresh of that token followed by one replay of the
//! request. Concurrent 401s share a single refresh: the first becomes the
//! leader and calls the refresh endpoint, the rest queue behind it and are
//! released with its outcome.
//!
//! Request lifecycle:
//! 1. `INIT -> SENT` with the current access token (if any)
//! 2. 2xx/other status → done; 401 → `UNAUTHORIZED`
//! 3. `UNAUTHORIZED` → `REFRESHING` (leader) or `WAITING_FOR_REFRESH` (queued)
//! 4. Refresh succeeded → `RETRIED` with the new token, a second 401 is final
//! 5. Refresh failed → credentials cleared, `LoggedOut` broadcast, error returned

pub mod accounts;
pub mod client;
pub mod error;
pub mod refresh;
pub mod session;

pub use accounts::User;
pub use client::{ApiClient, ApiClientBuilder, ApiResponse};
pub use error::{Error, Result};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshGuard, RefreshOutcome, Ticket};
pub use session::{LogoutReason, SessionEvent, SessionEvents};
