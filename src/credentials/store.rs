//! Credential Store
//!
//! Single source of truth for the current credential pair, hydrated from
//! persistent storage on first access.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::{Credential, KeyValueStore};
use crate::error::StorageError;

/// Persistent slot holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "booking.access_token";
/// Persistent slot holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "booking.refresh_token";

#[derive(Debug)]
enum Slot {
    Unloaded,
    Loaded(Option<Credential>),
}

/// Holds the current credential in memory in front of two persistent slots.
///
/// `set` and `clear` return only after storage has been updated. The expiry
/// hint is kept in memory only.
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    current: Mutex<Slot>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            current: Mutex::new(Slot::Unloaded),
        }
    }

    /// Returns the current credential, reading storage on first use.
    pub async fn get(&self) -> Result<Option<Credential>, StorageError> {
        let mut slot = self.current.lock().await;
        if let Slot::Loaded(credential) = &*slot {
            return Ok(credential.clone());
        }

        let access = self.storage.get(ACCESS_TOKEN_KEY).await?;
        let refresh = self.storage.get(REFRESH_TOKEN_KEY).await?;
        let credential = access.map(|access| Credential::new(access, refresh));
        debug!(present = credential.is_some(), "credential store hydrated");

        *slot = Slot::Loaded(credential.clone());
        Ok(credential)
    }

    /// Replaces the current credential.
    ///
    /// Memory changes only after both storage slots are written, so a failed
    /// write leaves the previous credential in effect.
    pub async fn set(&self, credential: Credential) -> Result<(), StorageError> {
        let mut slot = self.current.lock().await;

        self.storage
            .set(ACCESS_TOKEN_KEY, &credential.access_token)
            .await?;
        match &credential.refresh_token {
            Some(refresh) => self.storage.set(REFRESH_TOKEN_KEY, refresh).await?,
            None => self.storage.remove(REFRESH_TOKEN_KEY).await?,
        }

        *slot = Slot::Loaded(Some(credential));
        Ok(())
    }

    /// Drops the credential from memory and storage.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut slot = self.current.lock().await;
        *slot = Slot::Loaded(None);

        self.storage.remove(ACCESS_TOKEN_KEY).await?;
        self.storage.remove(REFRESH_TOKEN_KEY).await
    }

    pub async fn access_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.get().await?.map(|c| c.access_token))
    }
}
