//! Refresh Coordinator
//!
//! Serializes access-credential renewal. However many calls fail
//! authorization at once, one renewal runs; every caller waits on its
//! outcome and then retries its own call once.
//!
//! Cycle states: Idle (no cycle stored) and Renewing (a cycle stored). The
//! Idle -> Renewing transition happens under a synchronous lock before any
//! suspension, so a second failure observed at the same time always joins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::credentials::{Credential, CredentialStore};
use crate::error::{classify, ApiError, ErrorKind, Locale};
use crate::models::{RefreshRequest, TokenResponse};
use crate::sync::MutexExt;
use crate::transport::{Method, Transport, TransportRequest};

// == Token Renewer ==
/// Exchanges a refresh token for a new token pair.
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    async fn renew(&self, refresh_token: &str) -> Result<TokenResponse, ApiError>;
}

/// Renews through the backend's renewal endpoint on the shared transport.
pub struct TransportRenewer {
    transport: Arc<dyn Transport>,
    path: String,
    locale: Locale,
}

impl TransportRenewer {
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>, locale: Locale) -> Self {
        Self {
            transport,
            path: path.into(),
            locale,
        }
    }
}

#[async_trait]
impl TokenRenewer for TransportRenewer {
    async fn renew(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: refresh_token.to_string(),
        })
        .map_err(|e| ApiError::new(ErrorKind::Unknown, self.locale, e.to_string()))?;

        let request = TransportRequest::new(Method::Post, self.path.as_str()).with_body(Some(body));
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|failure| classify(&failure, self.locale))?;

        serde_json::from_value(response.body).map_err(|e| {
            ApiError::new(
                ErrorKind::Unknown,
                self.locale,
                format!("malformed renewal response: {}", e),
            )
        })
    }
}

// == Coordinator ==
type RenewalOutcome = Result<Credential, ApiError>;

/// Single-flight guard around credential renewal.
pub struct RefreshCoordinator {
    credentials: Arc<CredentialStore>,
    renewer: Arc<dyn TokenRenewer>,
    timeout: Duration,
    locale: Locale,
    cycle: Mutex<Option<Shared<oneshot::Receiver<RenewalOutcome>>>>,
    renewals: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        renewer: Arc<dyn TokenRenewer>,
        timeout: Duration,
        locale: Locale,
    ) -> Self {
        Self {
            credentials,
            renewer,
            timeout,
            locale,
            cycle: Mutex::new(None),
            renewals: AtomicU64::new(0),
        }
    }

    /// Obtains a credential to replace `rejected_token`.
    ///
    /// Joins the running cycle if there is one, otherwise starts one. On
    /// failure the credential store has been cleared and the error is a
    /// terminal Unauthorized.
    pub async fn renew(self: &Arc<Self>, rejected_token: &str) -> RenewalOutcome {
        let outcome = {
            let mut cycle = self.cycle.lock_or_recover();
            match cycle.clone() {
                Some(running) => {
                    debug!("joining credential renewal in progress");
                    running
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    let shared = rx.shared();
                    *cycle = Some(shared.clone());

                    let coordinator = Arc::clone(self);
                    let rejected = rejected_token.to_string();
                    tokio::spawn(async move {
                        let result = coordinator.run_cycle(&rejected).await;
                        // Back to Idle before anyone is released
                        *coordinator.cycle.lock_or_recover() = None;
                        let _ = tx.send(result);
                    });
                    shared
                }
            }
        };

        match outcome.await {
            Ok(result) => result,
            Err(_) => Err(ApiError::session_expired(
                self.locale,
                "credential renewal ended without an outcome",
            )),
        }
    }

    /// Number of renewal calls actually issued.
    pub fn renewal_count(&self) -> u64 {
        self.renewals.load(Ordering::SeqCst)
    }

    pub fn is_renewing(&self) -> bool {
        self.cycle.lock_or_recover().is_some()
    }

    async fn run_cycle(&self, rejected_token: &str) -> RenewalOutcome {
        let current = match self.credentials.get().await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "credential store unreadable during renewal");
                None
            }
        };
        let Some(current) = current else {
            return Err(ApiError::session_expired(self.locale, "no credential to renew"));
        };

        // Another cycle already replaced the rejected token
        if current.access_token != rejected_token {
            debug!("credential already renewed; reusing current token");
            return Ok(current);
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            return self.fail("no refresh token held").await;
        };

        self.renewals.fetch_add(1, Ordering::SeqCst);
        info!("renewing access credential");

        match tokio::time::timeout(self.timeout, self.renewer.renew(&refresh_token)).await {
            Ok(Ok(tokens)) => {
                let renewed = Credential::from_token_response(tokens, Some(refresh_token), Utc::now());
                if let Err(e) = self.credentials.set(renewed.clone()).await {
                    warn!(error = %e, "renewed credential could not be persisted; previous one stays current");
                }
                info!("access credential renewed");
                Ok(renewed)
            }
            Ok(Err(e)) => self.fail(&format!("renewal rejected: {}", e)).await,
            Err(_) => {
                self.fail(&format!("renewal timed out after {:?}", self.timeout))
                    .await
            }
        }
    }

    async fn fail(&self, detail: &str) -> RenewalOutcome {
        warn!(detail, "credential renewal failed; clearing session");
        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "credential store could not be cleared");
        }
        Err(ApiError::session_expired(self.locale, detail))
    }
}
