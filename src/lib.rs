//! Booking Client - request layer for a booking platform's HTTP backend
//!
//! Caches idempotent reads with TTL expiration and LRU eviction, coalesces
//! identical concurrent reads, serializes access-credential renewal, and
//! classifies every failure into a user-facing error.

pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod inflight;
pub mod models;
pub mod notify;
pub mod refresh;
pub mod retry;
mod sync;
pub mod tasks;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder, CallKind, RequestOptions, SweepReport};
pub use config::ClientConfig;
pub use error::{ApiError, ErrorKind, Locale, Result};
pub use tasks::spawn_cleanup_task;
pub use transport::Method;
