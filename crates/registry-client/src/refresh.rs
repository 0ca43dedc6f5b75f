//! Coalescing of concurrent token refreshes
//!
//! The coordinator owns the refresh-in-progress flag and the queue of
//! requests waiting on it. Both sit behind one `std::sync::Mutex` that is
//! only held for the flag check and the push/drain, never across an await,
//! so the flag is set before the leader's first suspension point.
//!
//! At most one leader exists at a time. Its `RefreshGuard` releases the
//! queue exactly once: explicitly through `settle`, or on drop if the
//! leader's future is cancelled or panics. Waiters released by a dropped
//! guard see `RefreshFailure::Abandoned` and may start a refresh of their own.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Why a refresh did not produce a token. Cloned to every queued waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    /// The refresh ran and was rejected; the session is over.
    #[error("{0}")]
    Failed(String),

    /// The leader went away before settling; the session is untouched.
    #[error("token refresh was abandoned")]
    Abandoned,
}

/// New access token, or the reason there isn't one.
pub type RefreshOutcome = std::result::Result<String, RefreshFailure>;

#[derive(Default)]
struct State {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Shared refresh state for one `ApiClient` and its clones.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

/// Role handed out by `RefreshCoordinator::begin`.
pub enum Ticket<'a> {
    /// No refresh was running; the holder must perform it and settle.
    Leader(RefreshGuard<'a>),
    /// A refresh is running; the receiver yields its outcome.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the current refresh, or start one if none is running.
    pub fn begin(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            debug!(queued = state.waiters.len(), "refresh in flight, queued");
            Ticket::Follower(rx)
        } else {
            state.in_flight = true;
            debug!("starting token refresh");
            Ticket::Leader(RefreshGuard {
                coordinator: self,
                settled: false,
            })
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of requests waiting on the in-flight refresh.
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Clear the flag and release every waiter in arrival order.
    fn release(&self, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        let released = waiters.len();
        for waiter in waiters {
            // A waiter whose request was dropped has nothing to replay
            let _ = waiter.send(outcome.clone());
        }
        released
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of leadership over the in-flight refresh.
pub struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    /// Finish the refresh: clear the flag and hand `outcome` to every queued
    /// request. Returns how many were released.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        let released = self.coordinator.release(outcome);
        debug!(released, "token refresh settled");
        released
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let released = self.coordinator.release(Err(RefreshFailure::Abandoned));
            warn!(released, "token refresh abandoned before settling");
        }
    }
}
