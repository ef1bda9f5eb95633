//! Credentials Module
//!
//! The current access/refresh pair, its persistent backing slots, and the
//! store that keeps both in step.

mod credential;
mod storage;
mod store;

pub use credential::Credential;
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
