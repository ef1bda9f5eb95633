//! Transport Module
//!
//! The seam between the pipeline and the network. The pipeline only needs
//! `execute(request) -> response | failure`; [`HttpTransport`] is the
//! production implementation.

mod http;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpTransport;

// == Method ==
/// HTTP verbs issued by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Reads are idempotent and eligible for caching and coalescing.
    pub fn is_read(self) -> bool {
        matches!(self, Method::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Request ==
/// An outbound call, fully described.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Resource path relative to the base URL, e.g. `/bookings/42`
    pub path: String,
    /// Query parameters in caller order
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Sets a header, replacing any existing value (names compare case-insensitively).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// == Response ==
/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Decoded JSON body; `Value::Null` when the body was empty
    pub body: Value,
}

// == Failure ==
/// Raw failure reported by a transport, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The backend answered with a non-success status
    Status { status: u16, body: Value },
    /// No response was received (connect error, timeout, reset)
    NoResponse(String),
    /// The request could not be built or the response could not be read
    Local(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status { status, .. } => write!(f, "HTTP status {}", status),
            TransportError::NoResponse(reason) => write!(f, "no response: {}", reason),
            TransportError::Local(reason) => write!(f, "local failure: {}", reason),
        }
    }
}

// == Transport Trait ==
/// Executes a single outbound call. Implementations do not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}
