//! Coalescing of concurrent identical requests.
//!
//! When several callers ask for the same cache key while a fetch for it is
//! already running, only the first caller starts the producer. The producer
//! runs as its own task, so it settles even if the caller that started it
//! gives up; every caller, the first included, subscribes to its outcome,
//! success or failure.
//!
//! ```text
//! panel A ─┐
//!          │                          ┌────────────┐
//! panel B ─┼──► RequestDeduplicator ──► producer() │ (spawned once)
//!          │        │                 └─────┬──────┘
//! panel C ─┘        ▼                       │
//!             [A, B, C all receive ◄────────┘
//!              the same result]
//! ```
//!
//! Uses `DashMap`'s entry API for atomic check-and-insert and a
//! `tokio::sync::broadcast` channel per in-flight key. Producers are tracked
//! by a `TaskTracker` so shutdown can wait for them. Statistics use atomic
//! counters.

use crate::error::FetchError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

type Outcome<T> = Result<T, FetchError>;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct DedupStats {
    /// Total calls to `dedupe`
    pub total_requests: u64,
    /// Calls that waited on an existing producer
    pub coalesced_requests: u64,
    /// Calls that ran their own producer
    pub new_requests: u64,
}

impl DedupStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

type InFlightMap<T> = DashMap<String, broadcast::Sender<Outcome<T>>>;

/// Tracks in-flight requests keyed by cache key.
pub struct RequestDeduplicator<T> {
    in_flight: Arc<InFlightMap<T>>,
    producers: TaskTracker,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

/// Owned by a running producer task; publishes its outcome exactly once.
///
/// If the task ends without settling (it panicked or the runtime shut
/// down), dropping the entry closes the channel and subscribers observe
/// [`FetchError::Cancelled`].
struct InFlightEntry<T> {
    map: Arc<InFlightMap<T>>,
    key: String,
    settled: bool,
}

impl<T: Clone> InFlightEntry<T> {
    fn settle(mut self, outcome: Outcome<T>) {
        self.settled = true;
        if let Some((_, tx)) = self.map.remove(&self.key) {
            let subscribers = tx.receiver_count();
            // Every subscriber may have gone away; that is fine
            let _ = tx.send(outcome);
            debug!(key = %self.key, subscribers, "Broadcast in-flight result");
        }
    }
}

impl<T> Drop for InFlightEntry<T> {
    fn drop(&mut self) {
        if !self.settled && self.map.remove(&self.key).is_some() {
            debug!(key = %self.key, "In-flight request abandoned - subscribers cancelled");
        }
    }
}

impl<T: Clone + Send + 'static> RequestDeduplicator<T> {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            producers: TaskTracker::new(),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            new_requests: AtomicU64::new(0),
        }
    }

    /// Start `producer` for `key` unless a run is already in flight, then
    /// wait for that run's outcome.
    ///
    /// The run is detached from the caller: dropping this future stops the
    /// wait, never the run. The entry is removed as soon as the run settles,
    /// so a later call for the same key starts a fresh run.
    pub async fn dedupe<F, Fut>(&self, key: &str, producer: F) -> Outcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let (mut receiver, leader) = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "Coalescing request - waiting for in-flight fetch");
                (entry.get().subscribe(), false)
            }
            Entry::Vacant(entry) => {
                // Capacity 1 suffices: exactly one value is ever sent
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx);
                self.new_requests.fetch_add(1, Ordering::Relaxed);
                (rx, true)
            }
        };

        if leader {
            let entry = InFlightEntry {
                map: Arc::clone(&self.in_flight),
                key: key.to_string(),
                settled: false,
            };
            let run = producer();
            self.producers.spawn(async move {
                let outcome = run.await;
                entry.settle(outcome);
            });
        }

        match receiver.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Cancelled),
        }
    }

    /// Wait for every producer started so far to settle.
    pub async fn wait_idle(&self) {
        self.producers.close();
        self.producers.wait().await;
        self.producers.reopen();
    }

    /// Returns the number of currently in-flight requests.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> DedupStats {
        DedupStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Request coalescing statistics"
        );
    }
}

impl<T: Clone + Send + 'static> Default for RequestDeduplicator<T> {
    fn default() -> Self {
        Self::new()
    }
}
