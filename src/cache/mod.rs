//! Cache Module
//!
//! Response cache for idempotent reads: per-entry TTL expiration and
//! least-recently-used eviction under a fixed capacity.

mod entry;
mod key;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::ResponseCache;
