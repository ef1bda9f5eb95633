//! Request Pipeline
//!
//! [`ApiClient`] is the single entry point for outbound calls. Reads are
//! served from the response cache when fresh, otherwise coalesced with any
//! identical read in flight. Every dispatch carries the current access token;
//! an authorization failure hands off to the refresh coordinator and the call
//! is retried once with the renewed token.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, ResponseCache};
use crate::config::ClientConfig;
use crate::credentials::{Credential, CredentialStore, KeyValueStore, MemoryStorage};
use crate::error::{classify, ApiError, ErrorKind, Locale, Result};
use crate::inflight::InFlightRegistry;
use crate::models::{LoginRequest, TokenResponse};
use crate::notify::{Notifier, TracingNotifier};
use crate::refresh::{RefreshCoordinator, TokenRenewer, TransportRenewer};
use crate::retry::RetryPolicy;
use crate::sync::MutexExt;
use crate::transport::{HttpTransport, Method, Transport, TransportRequest};

// == Call Kind ==
/// Role of a call in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallKind {
    #[default]
    Regular,
    /// A rejected login is not a stale token: never renews, never notifies
    Login,
    /// Best-effort sign-out: never renews, never notifies
    Logout,
}

impl CallKind {
    fn renews_on_unauthorized(self) -> bool {
        self == CallKind::Regular
    }
}

// == Request Options ==
/// Per-call knobs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters
    pub params: Vec<(String, String)>,
    /// Bypass the cache and the in-flight registry entirely
    pub skip_cache: bool,
    /// The caller displays its own failure UI
    pub skip_auto_error_display: bool,
    /// Overrides the default TTL for this read's cached response
    pub cache_ttl: Option<Duration>,
    pub kind: CallKind,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn skip_auto_error_display(mut self) -> Self {
        self.skip_auto_error_display = true;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn login_attempt(mut self) -> Self {
        self.kind = CallKind::Login;
        self
    }

    fn notifies(&self) -> bool {
        !self.skip_auto_error_display && self.kind == CallKind::Regular
    }
}

/// Counts reported by one sweep of the background cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_entries: usize,
    pub stale_flights: usize,
}

// == Builder ==
/// Assembles an [`ApiClient`]; unset collaborators get production defaults.
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    renewer: Option<Arc<dyn TokenRenewer>>,
    notifier: Option<Arc<dyn Notifier>>,
    retry: Option<RetryPolicy>,
}

impl ApiClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn renewer(mut self, renewer: Arc<dyn TokenRenewer>) -> Self {
        self.renewer = Some(renewer);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Fails only if the default HTTP transport cannot be constructed.
    pub fn build(self) -> Result<ApiClient> {
        let config = self.config;
        let locale = config.locale;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let http = HttpTransport::new(&config.base_url, config.request_timeout())
                    .map_err(|failure| classify(&failure, locale))?;
                Arc::new(http)
            }
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let renewer = self.renewer.unwrap_or_else(|| {
            Arc::new(TransportRenewer::new(
                transport.clone(),
                config.refresh_path.clone(),
                locale,
            ))
        });

        let credentials = Arc::new(CredentialStore::new(storage));
        let refresh = Arc::new(RefreshCoordinator::new(
            credentials.clone(),
            renewer,
            config.refresh_timeout(),
            locale,
        ));
        let retry = self.retry.unwrap_or_else(|| {
            RetryPolicy::exponential(config.retry_max_retries, config.retry_base_delay())
        });

        Ok(ApiClient {
            inner: Arc::new(Inner {
                transport,
                cache: Mutex::new(ResponseCache::new(
                    config.cache_max_entries,
                    config.cache_ttl(),
                )),
                inflight: Arc::new(InFlightRegistry::new(config.inflight_timeout(), locale)),
                credentials,
                refresh,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                retry,
                locale,
                config,
            }),
        })
    }
}

// == Api Client ==
/// Cheaply cloneable handle; clones share cache, registry and credentials.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    cache: Mutex<ResponseCache>,
    inflight: Arc<InFlightRegistry>,
    credentials: Arc<CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    locale: Locale,
    config: ClientConfig,
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            transport: None,
            storage: None,
            renewer: None,
            notifier: None,
            retry: None,
        }
    }

    // == Consumer Surface ==
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Value> {
        self.request(Method::Get, path, None, options).await
    }

    /// Reads and decodes the payload. A payload of the wrong shape is an unknown error.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let value = self.get(path, options.clone()).await?;
        serde_json::from_value(value).map_err(|e| {
            let err = ApiError::new(
                ErrorKind::Unknown,
                self.inner.locale,
                format!("unexpected response shape for {}: {}", path, e),
            );
            self.report(&err, &options);
            err
        })
    }

    pub async fn post(&self, path: &str, body: Value, options: RequestOptions) -> Result<Value> {
        self.request(Method::Post, path, Some(body), options).await
    }

    pub async fn put(&self, path: &str, body: Value, options: RequestOptions) -> Result<Value> {
        self.request(Method::Put, path, Some(body), options).await
    }

    pub async fn patch(&self, path: &str, body: Value, options: RequestOptions) -> Result<Value> {
        self.request(Method::Patch, path, Some(body), options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Value> {
        self.request(Method::Delete, path, None, options).await
    }

    /// Runs one call through the pipeline and reports a terminal failure.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let result = self.execute(method, path, body, &options).await;
        if let Err(err) = &result {
            self.report(err, &options);
        }
        result
    }

    /// Runs a call under the configured retry policy.
    ///
    /// Only the final failure is reported; intermediate retryable failures are not.
    pub async fn critical(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let policy = self.inner.retry;
        self.critical_with(policy, method, path, body, options).await
    }

    pub async fn critical_with(
        &self,
        policy: RetryPolicy,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let result = policy
            .run(|| self.execute(method, path, body.clone(), &options))
            .await;
        if let Err(err) = &result {
            self.report(err, &options);
        }
        result
    }

    // == Session ==
    /// Signs in and stores the issued credential. Clears cached reads.
    pub async fn login(&self, request: &LoginRequest) -> Result<Credential> {
        let locale = self.inner.locale;
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::new(ErrorKind::Unknown, locale, e.to_string()))?;

        let path = self.inner.config.login_path.clone();
        let value = self
            .request(
                Method::Post,
                &path,
                Some(body),
                RequestOptions::new().login_attempt(),
            )
            .await?;

        let tokens: TokenResponse = serde_json::from_value(value).map_err(|e| {
            ApiError::new(
                ErrorKind::Unknown,
                locale,
                format!("malformed login response: {}", e),
            )
        })?;
        let credential = Credential::from_token_response(tokens, None, Utc::now());
        self.set_credential(credential.clone()).await?;
        self.clear_cache();
        info!("signed in");
        Ok(credential)
    }

    /// Signs out. The backend call is best effort; the local session is
    /// cleared whatever its outcome.
    pub async fn logout(&self) -> Result<()> {
        if self.is_authenticated().await? {
            let options = RequestOptions {
                kind: CallKind::Logout,
                ..RequestOptions::default()
            };
            let path = self.inner.config.logout_path.clone();
            if let Err(err) = self.request(Method::Post, &path, None, options).await {
                warn!(kind = %err.kind, "logout call failed; clearing local session anyway");
            }
        }

        self.clear_cache();
        self.inner
            .credentials
            .clear()
            .await
            .map_err(|e| e.into_api_error(self.inner.locale))?;
        info!("signed out");
        Ok(())
    }

    /// Installs a credential obtained outside [`ApiClient::login`].
    pub async fn set_credential(&self, credential: Credential) -> Result<()> {
        self.inner
            .credentials
            .set(credential)
            .await
            .map_err(|e| e.into_api_error(self.inner.locale))
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        let credential = self
            .inner
            .credentials
            .get()
            .await
            .map_err(|e| e.into_api_error(self.inner.locale))?;
        Ok(credential.is_some())
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    // == Cache Control ==
    /// Drops the cached read for `path` with exactly these parameters.
    pub fn invalidate(&self, path: &str, params: &[(String, String)]) -> bool {
        let key = CacheKey::new(Method::Get, path, params);
        self.inner.cache.lock_or_recover().invalidate(&key)
    }

    /// Drops every cached read of `path`, whatever its parameters.
    pub fn invalidate_path(&self, path: &str) -> usize {
        self.inner.cache.lock_or_recover().invalidate_path(path)
    }

    pub fn clear_cache(&self) {
        self.inner.cache.lock_or_recover().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.lock_or_recover().stats()
    }

    /// Removes expired cache entries and in-flight entries past the safeguard.
    pub fn sweep(&self) -> SweepReport {
        let expired_entries = self.inner.cache.lock_or_recover().cleanup_expired();
        let stale_flights = self.inner.inflight.sweep_stale();
        SweepReport {
            expired_entries,
            stale_flights,
        }
    }

    pub fn inflight_count(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Renewal calls issued since construction.
    pub fn renewal_count(&self) -> u64 {
        self.inner.refresh.renewal_count()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // == Pipeline ==
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<Value> {
        let request = TransportRequest::new(method, path)
            .with_params(options.params.clone())
            .with_body(body);

        if !method.is_read() || options.skip_cache {
            return self.inner.dispatch(request, options.kind).await;
        }

        let key = CacheKey::new(method, path, &options.params);
        let cached = self.inner.cache.lock_or_recover().get(&key);
        if let Some(value) = cached {
            debug!(key = %key, "served from cache");
            return Ok(value);
        }

        let inner = Arc::clone(&self.inner);
        let kind = options.kind;
        let ttl = options.cache_ttl;
        let flight = self.inner.inflight.join_or_start(key, move |lease| async move {
            let outcome = inner.dispatch(request, kind).await;
            if let Ok(value) = &outcome {
                // A flight replaced by the safeguard must not overwrite its successor
                let cached = lease.commit_if_current(|| {
                    inner.remember(lease.key().clone(), value.clone(), ttl)
                });
                if !cached {
                    debug!(key = %lease.key(), "superseded flight; response not cached");
                }
            }
            outcome
        });
        flight.wait().await
    }

    fn report(&self, err: &ApiError, options: &RequestOptions) {
        if options.notifies() {
            self.inner.notifier.notify(err);
        } else {
            debug!(kind = %err.kind, "failure returned without display");
        }
    }
}

impl Inner {
    /// Attaches the credential, dispatches, and renews once on rejection.
    async fn dispatch(&self, request: TransportRequest, kind: CallKind) -> Result<Value> {
        let token = self
            .credentials
            .access_token()
            .await
            .map_err(|e| e.into_api_error(self.locale))?;

        let err = match self.send(request.clone(), token.as_deref()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_unauthorized() || !kind.renews_on_unauthorized() {
            return Err(err);
        }
        let Some(rejected) = token else {
            debug!(path = %request.path, "unauthorized without a credential; nothing to renew");
            return Err(err);
        };

        info!(
            method = %request.method,
            path = %request.path,
            "access credential rejected; awaiting renewal"
        );
        let credential = self.refresh.renew(&rejected).await?;

        // Exactly one retry; a second rejection is terminal
        self.send(request, Some(&credential.access_token)).await
    }

    async fn send(&self, mut request: TransportRequest, token: Option<&str>) -> Result<Value> {
        if let Some(token) = token {
            request.set_header("Authorization", format!("Bearer {}", token));
        }
        let method = request.method;
        let path = request.path.clone();

        match self.transport.execute(request).await {
            Ok(response) => {
                debug!(%method, path = %path, status = response.status, "request succeeded");
                Ok(response.body)
            }
            Err(failure) => {
                let err = classify(&failure, self.locale);
                debug!(%method, path = %path, kind = %err.kind, status = ?err.status, "request failed");
                Err(err)
            }
        }
    }

    fn remember(&self, key: CacheKey, value: Value, ttl: Option<Duration>) {
        let mut cache = self.cache.lock_or_recover();
        match ttl {
            Some(ttl) => cache.put_with_ttl(key, value, ttl),
            None => cache.put(key, value),
        }
    }
}
