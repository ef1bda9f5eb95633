//! Wire models for the authentication endpoints
//!
//! Everything else the backend returns is treated as an opaque JSON payload.

pub mod auth;

pub use auth::{LoginRequest, RefreshRequest, TokenResponse};
