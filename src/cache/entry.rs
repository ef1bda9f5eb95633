//! Cache Entry Module
//!
//! A stored response payload together with the instant it was stored.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

// == Cache Entry ==
/// A cached response. Valid while `now - stored_at < ttl`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The opaque response payload
    pub value: Value,
    /// When the payload was written
    pub stored_at: Instant,
    /// How long the payload may be served
    pub ttl: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stored at the current instant.
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: the entry is expired as soon as the elapsed time
    /// reaches the TTL, so an entry is never served at `now - stored_at == ttl`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl
            .saturating_sub(Instant::now().saturating_duration_since(self.stored_at))
    }
}
