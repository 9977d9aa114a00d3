//! Single-flight bookkeeping for network fetches.
//!
//! The first caller to miss every cache tier for a key becomes the leader and
//! starts the fetch; callers arriving while it runs subscribe to the same
//! broadcast and receive an identical result.
//!
//! ```text
//! resolve A ─┐
//!            │                          fetch task
//! resolve B ─┼──► InFlightTable ──────► (one per key)
//!            │        │                      │
//! resolve C ─┘        ▼                      ▼
//!               [A, B, C receive    remove entry, then
//!                the same result]◄── broadcast result
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::entities::{CacheKey, LoadedImage};
use crate::domain::errors::{FetchError, FetchResult};

type Outcome = FetchResult<LoadedImage>;

/// Tracks fetches in progress, keyed by cache key.
#[derive(Default)]
pub struct InFlightTable {
    in_flight: Mutex<HashMap<CacheKey, broadcast::Sender<Outcome>>>,
    new_requests: AtomicU64,
    coalesced_requests: AtomicU64,
}

/// Outcome of registering interest in a key.
pub enum Registration {
    /// No fetch was running: the caller must start one and resolve `completion`.
    Leader {
        /// Receives the result like any other waiter.
        waiter: Waiter,
        /// Publishes the result.
        completion: Completion,
    },
    /// A fetch is already running for this key.
    Follower(Waiter),
}

impl InFlightTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the fetch for `key`, creating it if none is running.
    pub fn register(self: &Arc<Self>, key: &CacheKey) -> Registration {
        let mut in_flight = self.in_flight.lock();

        if let Some(tx) = in_flight.get(key) {
            let rx = tx.subscribe();
            let coalesced = self.coalesced_requests.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(key = %key, coalesced, "Coalescing request onto in-flight fetch");
            return Registration::Follower(Waiter { rx });
        }

        // A single message is ever sent per channel.
        let (tx, rx) = broadcast::channel(1);
        in_flight.insert(key.clone(), tx.clone());
        self.new_requests.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, in_flight = in_flight.len(), "Starting new fetch");

        Registration::Leader {
            waiter: Waiter { rx },
            completion: Completion {
                table: Arc::clone(self),
                key: key.clone(),
                sender: Some(tx),
            },
        }
    }

    /// Returns true if a fetch for `key` is running.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    /// Returns the number of fetches currently running.
    pub fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Returns true if nothing is being fetched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registrations that started a fetch.
    pub fn new_requests(&self) -> u64 {
        self.new_requests.load(Ordering::Relaxed)
    }

    /// Number of registrations that joined an existing fetch.
    pub fn coalesced_requests(&self) -> u64 {
        self.coalesced_requests.load(Ordering::Relaxed)
    }

    fn remove(&self, key: &CacheKey) -> Option<broadcast::Sender<Outcome>> {
        self.in_flight.lock().remove(key)
    }
}

/// Publishing side of an in-flight fetch.
///
/// Dropping it without calling [`Completion::complete`] still removes the
/// entry; waiters then observe a network failure.
pub struct Completion {
    table: Arc<InFlightTable>,
    key: CacheKey,
    sender: Option<broadcast::Sender<Outcome>>,
}

impl Completion {
    /// Removes the entry from the table, then hands `outcome` to every waiter.
    pub fn complete(mut self, outcome: Outcome) {
        self.sender = None;
        let Some(tx) = self.table.remove(&self.key) else {
            return;
        };
        let waiters = tx.receiver_count();
        // Waiters may have gone away; nothing to do then.
        let _ = tx.send(outcome);
        debug!(key = %self.key, waiters, "Published fetch result");
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.sender.take().is_some() {
            self.table.remove(&self.key);
            debug!(key = %self.key, "Fetch abandoned before completion");
        }
    }
}

/// Receiving side of an in-flight fetch.
pub struct Waiter {
    rx: broadcast::Receiver<Outcome>,
}

impl Waiter {
    /// Suspends until the fetch publishes its result.
    pub async fn wait(mut self) -> Outcome {
        match self.rx.recv().await {
            Ok(outcome) => outcome,
            Err(broadcast::error::RecvError::Closed) => {
                Err(FetchError::network("fetch ended without a result"))
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {
                Err(FetchError::network("fetch result was lost"))
            }
        }
    }
}
