//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use booking_client::credentials::{Credential, KeyValueStore, MemoryStorage};
use booking_client::error::ApiError;
use booking_client::notify::Notifier;
use booking_client::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use booking_client::{ApiClient, ClientConfig};

pub type Reply = Result<TransportResponse, TransportError>;

type Handler = dyn Fn(&TransportRequest, usize) -> Reply + Send + Sync;
type Latency = dyn Fn(usize) -> Duration + Send + Sync;

// == Scripted Transport ==
/// In-process backend: every call is logged, then answered by `handler`.
///
/// The handler sees the request as it arrives plus the 1-based number of
/// calls made so far to the same path. The reply is delivered after the
/// latency computed for the global call number.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    latency: Box<Latency>,
    calls: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&TransportRequest, usize) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_latency(Duration::ZERO, handler)
    }

    pub fn with_latency(
        latency: Duration,
        handler: impl Fn(&TransportRequest, usize) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_latency_fn(move |_| latency, handler)
    }

    pub fn with_latency_fn(
        latency: impl Fn(usize) -> Duration + Send + Sync + 'static,
        handler: impl Fn(&TransportRequest, usize) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            latency: Box::new(latency),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Reply {
        let (reply, delay) = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            let total = calls.len();
            let same_path = calls.iter().filter(|r| r.path == request.path).count();
            ((self.handler)(&request, same_path), (self.latency)(total))
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

// == Replies ==
pub fn ok(body: Value) -> Reply {
    Ok(TransportResponse { status: 200, body })
}

pub fn status(code: u16, body: Value) -> Reply {
    Err(TransportError::Status { status: code, body })
}

pub fn unauthorized() -> Reply {
    status(401, json!({ "message": "token expired" }))
}

pub fn bearer(request: &TransportRequest) -> Option<&str> {
    request
        .header("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
}

// == Recording Notifier ==
#[derive(Default)]
pub struct RecordingNotifier {
    errors: Mutex<Vec<ApiError>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<ApiError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, error: &ApiError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

// == Client Fixtures ==
pub fn client_with(
    transport: Arc<ScriptedTransport>,
    notifier: Arc<RecordingNotifier>,
) -> ApiClient {
    ApiClient::builder(ClientConfig::default())
        .transport(transport)
        .notifier(notifier)
        .build()
        .unwrap()
}

/// A client already holding `access` / `refresh`.
pub async fn signed_in_client(
    transport: Arc<ScriptedTransport>,
    notifier: Arc<RecordingNotifier>,
    access: &str,
    refresh: &str,
) -> ApiClient {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStorage::new());
    let client = ApiClient::builder(ClientConfig::default())
        .transport(transport)
        .notifier(notifier)
        .storage(storage)
        .build()
        .unwrap();
    client
        .set_credential(Credential::new(access, Some(refresh.to_string())))
        .await
        .unwrap();
    client
}
