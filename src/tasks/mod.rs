//! Background Tasks Module
//!
//! Contains the periodic housekeeping that runs alongside an [`ApiClient`](crate::ApiClient).

mod cleanup;

pub use cleanup::spawn_cleanup_task;
