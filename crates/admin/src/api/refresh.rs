//! Single-flight coordination of token refreshes.
//!
//! When several requests hit a 401 at once, exactly one of them (the leader)
//! talks to the refresh endpoint. Everyone else is parked in a FIFO queue and
//! released with the leader's outcome. The in-flight flag and the queue live
//! under one lock, so "is a refresh running?" and "enqueue me" can never be
//! interleaved with the leader settling.

use parking_lot::Mutex;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::oneshot;

/// Why a refresh could not produce a new credential pair.
///
/// `Clone` because one failure is handed to every queued follower.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Refresh rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Refresh abandoned before completion")]
    Abandoned,
}

type Waiter = oneshot::Sender<Result<SecretString, RefreshError>>;

#[derive(Default)]
struct CoordinatorState {
    in_flight: bool,
    queue: Vec<Waiter>,
}

/// Process-wide refresh coordinator.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("in_flight", &state.in_flight)
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// Outcome of [`RefreshCoordinator::acquire`].
#[derive(Debug)]
pub enum RefreshTicket<'a> {
    /// The caller must perform the refresh and settle the lease.
    Leader(RefreshLease<'a>),
    /// A refresh is already running; wait for its result.
    Follower(PendingRefresh),
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the leader, or join the queue if a refresh is in flight.
    pub fn acquire(&self) -> RefreshTicket<'_> {
        let mut state = self.state.lock();
        if state.in_flight {
            RefreshTicket::Follower(Self::enqueue(&mut state))
        } else {
            state.in_flight = true;
            RefreshTicket::Leader(RefreshLease {
                coordinator: self,
                settled: false,
            })
        }
    }

    /// Whether a refresh is currently in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight
    }

    /// Number of followers waiting on the current refresh.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn enqueue(state: &mut CoordinatorState) -> PendingRefresh {
        let (tx, rx) = oneshot::channel();
        state.queue.push(tx);
        PendingRefresh { rx }
    }

    /// Clear the flag and take the queue. Waiters are settled after the lock
    /// is dropped.
    fn release(&self) -> Vec<Waiter> {
        let mut state = self.state.lock();
        state.in_flight = false;
        std::mem::take(&mut state.queue)
    }

    fn drain_success(waiters: Vec<Waiter>, access: &SecretString) -> usize {
        let count = waiters.len();
        for waiter in waiters {
            // A follower that gave up has dropped its receiver.
            let _ = waiter.send(Ok(access.clone()));
        }
        count
    }

    fn drain_failure(waiters: Vec<Waiter>, error: &RefreshError) -> usize {
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
        count
    }
}

/// Leadership of the in-flight refresh.
///
/// Must be settled with [`succeed`](Self::succeed) or [`fail`](Self::fail).
/// Dropping it unsettled (leader cancelled or panicked) releases the flag and
/// fails the queue with [`RefreshError::Abandoned`].
#[derive(Debug)]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Release every follower with the new access token. Returns how many
    /// were waiting.
    pub fn succeed(mut self, access: &SecretString) -> usize {
        self.settled = true;
        let waiters = self.coordinator.release();
        RefreshCoordinator::drain_success(waiters, access)
    }

    /// Reject every follower with the refresh error. Returns how many were
    /// waiting.
    pub fn fail(mut self, error: &RefreshError) -> usize {
        self.settled = true;
        let waiters = self.coordinator.release();
        RefreshCoordinator::drain_failure(waiters, error)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let waiters = self.coordinator.release();
            let rejected = RefreshCoordinator::drain_failure(waiters, &RefreshError::Abandoned);
            tracing::warn!(rejected, "Token refresh leader dropped without settling");
        }
    }
}

/// A follower's place in the refresh queue.
#[derive(Debug)]
pub struct PendingRefresh {
    rx: oneshot::Receiver<Result<SecretString, RefreshError>>,
}

impl PendingRefresh {
    /// Wait for the leader's outcome.
    ///
    /// # Errors
    ///
    /// Returns the leader's refresh error, or [`RefreshError::Abandoned`] if
    /// the leader vanished without settling.
    pub async fn wait(self) -> Result<SecretString, RefreshError> {
        self.rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn leader(ticket: RefreshTicket<'_>) -> RefreshLease<'_> {
        match ticket {
            RefreshTicket::Leader(lease) => lease,
            RefreshTicket::Follower(_) => panic!("expected leader"),
        }
    }

    fn follower(ticket: RefreshTicket<'_>) -> PendingRefresh {
        match ticket {
            RefreshTicket::Follower(pending) => pending,
            RefreshTicket::Leader(_) => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn test_single_leader_and_fifo_success() {
        let coordinator = RefreshCoordinator::new();
        let lease = leader(coordinator.acquire());
        assert!(coordinator.is_refreshing());

        let first = follower(coordinator.acquire());
        let second = follower(coordinator.acquire());
        assert_eq!(coordinator.queued(), 2);

        let released = lease.succeed(&SecretString::from("fresh".to_string()));
        assert_eq!(released, 2);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.queued(), 0);

        assert_eq!(first.wait().await.unwrap().expose_secret(), "fresh");
        assert_eq!(second.wait().await.unwrap().expose_secret(), "fresh");
    }

    #[tokio::test]
    async fn test_failure_rejects_every_follower() {
        let coordinator = RefreshCoordinator::new();
        let lease = leader(coordinator.acquire());
        let pending = follower(coordinator.acquire());

        let error = RefreshError::Rejected {
            status: 401,
            message: "expired".to_string(),
        };
        assert_eq!(lease.fail(&error), 1);
        assert_eq!(pending.wait().await.unwrap_err(), error);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_dropped_leader_abandons_queue() {
        let coordinator = RefreshCoordinator::new();
        let lease = leader(coordinator.acquire());
        let pending = follower(coordinator.acquire());

        drop(lease);

        assert!(!coordinator.is_refreshing());
        assert_eq!(pending.wait().await.unwrap_err(), RefreshError::Abandoned);
    }

    #[tokio::test]
    async fn test_next_acquire_after_settle_leads_again() {
        let coordinator = RefreshCoordinator::new();
        leader(coordinator.acquire()).succeed(&SecretString::from("a".to_string()));
        let lease = leader(coordinator.acquire());
        lease.fail(&RefreshError::MissingRefreshToken);
        assert!(matches!(coordinator.acquire(), RefreshTicket::Leader(_)));
    }

    #[test]
    fn test_settling_with_departed_follower_does_not_panic() {
        let coordinator = RefreshCoordinator::new();
        let lease = leader(coordinator.acquire());
        drop(follower(coordinator.acquire()));
        assert_eq!(lease.succeed(&SecretString::from("a".to_string())), 1);
    }
}
