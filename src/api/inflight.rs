//! Coalescing of concurrent identical requests

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use super::{ApiError, RequestFingerprint};

/// Cloneable handle to the eventual outcome of an in-flight request
pub type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

/// Result of `InFlightRegistry::acquire`
pub enum Slot<T> {
    /// Another caller is already running this request; await its outcome
    Joined(SharedOutcome<T>),
    /// No request was running; the caller owns the new one and must resolve
    /// the ticket
    Owner(InFlightTicket<T>),
}

/// Tracks requests currently executing, one per fingerprint
pub struct InFlightRegistry<T> {
    pending: Mutex<HashMap<RequestFingerprint, SharedOutcome<T>>>,
}

impl<T> fmt::Debug for InFlightRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

impl<T> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> InFlightRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestFingerprint, SharedOutcome<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the marker for `key` so the next request starts fresh
    pub fn release(&self, key: &RequestFingerprint) {
        self.lock().remove(key);
    }

    /// Whether a request for `key` is currently running
    pub fn is_in_flight(&self, key: &RequestFingerprint) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of requests currently running
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> InFlightRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Joins the running request for `key`, or registers a new one owned by
    /// the caller
    ///
    /// Check and insert happen under one lock, so two callers can never both
    /// come away as owner of the same fingerprint.
    pub fn acquire(self: &Arc<Self>, key: &RequestFingerprint) -> Slot<T> {
        let mut pending = self.lock();
        if let Some(existing) = pending.get(key) {
            tracing::debug!(fingerprint = %key, "joining in-flight request");
            return Slot::Joined(existing.clone());
        }

        let (sender, receiver) = oneshot::channel();
        let outcome: SharedOutcome<T> = receiver
            .map(|received| {
                received.unwrap_or_else(|_| {
                    Err(ApiError::Aborted {
                        message: "in-flight request ended without a result".to_string(),
                    })
                })
            })
            .boxed()
            .shared();
        pending.insert(key.clone(), outcome.clone());

        Slot::Owner(InFlightTicket {
            registry: Arc::clone(self),
            key: key.clone(),
            sender: Some(sender),
            outcome,
        })
    }
}

/// Ownership of one in-flight request
///
/// `complete` hands the outcome to every waiter. The registry entry is
/// released whether or not the ticket is completed; a ticket dropped without
/// completing rejects its waiters with `ApiError::Aborted`.
pub struct InFlightTicket<T> {
    registry: Arc<InFlightRegistry<T>>,
    key: RequestFingerprint,
    sender: Option<oneshot::Sender<Result<T, ApiError>>>,
    outcome: SharedOutcome<T>,
}

impl<T> InFlightTicket<T> {
    /// Fingerprint this ticket owns
    pub fn key(&self) -> &RequestFingerprint {
        &self.key
    }

    /// Handle the owner itself awaits, identical to what joiners receive
    pub fn outcome(&self) -> SharedOutcome<T> {
        self.outcome.clone()
    }

    /// Releases the fingerprint and resolves all waiters with `result`
    ///
    /// The marker is gone before any waiter wakes, so a caller that observes
    /// the outcome and immediately asks again starts a fresh request.
    pub fn complete(mut self, result: Result<T, ApiError>) {
        self.release_own_marker();
        if let Some(sender) = self.sender.take() {
            // Nobody listening is fine; the owner may have been abandoned
            let _ = sender.send(result);
        }
    }

    fn release_own_marker(&self) {
        let mut pending = self.registry.lock();
        // A manual release may already have let a newer request register
        // under the same key; leave that one alone.
        let ours = pending
            .get(&self.key)
            .is_some_and(|current| current.ptr_eq(&self.outcome));
        if ours {
            pending.remove(&self.key);
        }
    }
}

impl<T> Drop for InFlightTicket<T> {
    fn drop(&mut self) {
        self.release_own_marker();
    }
}
