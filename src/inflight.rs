//! In-Flight Registry
//!
//! Request coalescing: callers issuing the same read while an identical one
//! is still executing share its single underlying call and its outcome.
//!
//! The shared work runs on its own task, so a caller that abandons its
//! interest never cancels the call for the others. On completion the entry
//! is removed before the outcome is published, so a call issued right after
//! completion starts fresh. A flight replaced by the staleness safeguard
//! still publishes to its own callers, but its lease no longer commits.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{FutureExt, Shared};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::CacheKey;
use crate::error::{ApiError, ErrorKind, Locale};
use crate::sync::MutexExt;

/// Result shared by every caller of one flight.
pub type Outcome = Result<Value, ApiError>;

type SharedOutcome = Shared<oneshot::Receiver<Outcome>>;

struct Flight {
    id: u64,
    started_at: Instant,
    outcome: SharedOutcome,
}

/// Tracks reads currently executing, keyed like the response cache.
///
/// Invariant: at most one entry per key; each entry is removed exactly once,
/// on completion or by the staleness safeguard, whichever comes first.
pub struct InFlightRegistry {
    flights: Mutex<HashMap<CacheKey, Flight>>,
    next_id: AtomicU64,
    stale_after: Duration,
    locale: Locale,
}

/// A caller's view of a flight.
pub struct FlightHandle {
    outcome: SharedOutcome,
    joined: bool,
    locale: Locale,
}

impl FlightHandle {
    /// Whether this caller joined an existing flight rather than starting one.
    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Waits for the shared outcome. Dropping this future only abandons this caller.
    pub async fn wait(self) -> Outcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::new(
                ErrorKind::Unknown,
                self.locale,
                "in-flight request ended without an outcome",
            )),
        }
    }
}

/// Proof that a flight still owns its registry entry.
///
/// Handed to the work when a flight starts. Once the entry is replaced or
/// swept, `commit_if_current` stops running its side effects.
pub struct FlightLease {
    registry: Arc<InFlightRegistry>,
    key: CacheKey,
    id: u64,
}

impl FlightLease {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Runs `commit` only while this flight owns its entry.
    ///
    /// The registry lock is held across `commit`, so a replacement cannot
    /// start in between the ownership check and the write.
    pub fn commit_if_current(&self, commit: impl FnOnce()) -> bool {
        let flights = self.registry.flights.lock_or_recover();
        let current = flights.get(&self.key).is_some_and(|flight| flight.id == self.id);
        if current {
            commit();
        }
        current
    }
}

impl InFlightRegistry {
    pub fn new(stale_after: Duration, locale: Locale) -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            stale_after,
            locale,
        }
    }

    /// Joins the flight for `key`, or starts one from `start`.
    ///
    /// Lookup and insertion happen under one lock with no suspension in
    /// between, so two simultaneous callers cannot both start. An entry older
    /// than the staleness bound is dropped and replaced. `start` receives the
    /// lease for the new flight.
    pub fn join_or_start<F, Fut>(self: &Arc<Self>, key: CacheKey, start: F) -> FlightHandle
    where
        F: FnOnce(FlightLease) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let now = Instant::now();
        let mut flights = self.flights.lock_or_recover();

        if let Some(flight) = flights.get(&key) {
            if now.saturating_duration_since(flight.started_at) < self.stale_after {
                debug!(key = %key, "joining in-flight request");
                return FlightHandle {
                    outcome: flight.outcome.clone(),
                    joined: true,
                    locale: self.locale,
                };
            }
            warn!(key = %key, "in-flight request exceeded its safeguard; starting fresh");
            flights.remove(&key);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let outcome = rx.shared();
        flights.insert(
            key.clone(),
            Flight {
                id,
                started_at: now,
                outcome: outcome.clone(),
            },
        );
        drop(flights);

        let work = start(FlightLease {
            registry: Arc::clone(self),
            key: key.clone(),
            id,
        });
        let completion = Completion {
            registry: Arc::clone(self),
            key,
            id,
        };
        tokio::spawn(async move {
            let result = work.await;
            drop(completion);
            let _ = tx.send(result);
        });

        FlightHandle {
            outcome,
            joined: false,
            locale: self.locale,
        }
    }

    /// Drops entries older than the staleness bound. Returns how many were dropped.
    pub fn sweep_stale(&self) -> usize {
        let now = Instant::now();
        let mut flights = self.flights.lock_or_recover();
        let before = flights.len();
        flights.retain(|_, flight| now.saturating_duration_since(flight.started_at) < self.stale_after);
        before - flights.len()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.flights.lock_or_recover().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.flights.lock_or_recover().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Only the flight that owns the entry may remove it.
    fn complete(&self, key: &CacheKey, id: u64) {
        let mut flights = self.flights.lock_or_recover();
        if flights.get(key).is_some_and(|flight| flight.id == id) {
            flights.remove(key);
        }
    }
}

/// Removes the flight's entry when dropped, including when the work panics.
struct Completion {
    registry: Arc<InFlightRegistry>,
    key: CacheKey,
    id: u64,
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.registry.complete(&self.key, self.id);
    }
}
