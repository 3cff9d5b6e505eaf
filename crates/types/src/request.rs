//! Request envelopes passed from the dispatcher to a transport.

use bytes::Bytes;
use derive_more::Display;

use crate::HostAddress;

/// HTTP method of a routed request. Esplora only needs these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Method {
    /// `GET`
    #[display("GET")]
    Get,
    /// `POST`
    #[display("POST")]
    Post,
}

/// How the caller intends to decode the response body.
///
/// The router never interprets the body; this only selects the `Accept`
/// header sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    /// Structured JSON (or plain text for scalar endpoints).
    #[default]
    Json,
    /// Raw bytes, e.g. a serialized block.
    Bytes,
}

impl ResponseKind {
    /// Value of the `Accept` header for this kind.
    #[must_use]
    pub const fn accept(&self) -> &'static str {
        match self {
            Self::Json => "application/json, text/plain, */*",
            Self::Bytes => "application/octet-stream",
        }
    }
}

/// One logical request against the Esplora API, independent of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsploraRequest {
    /// HTTP method.
    pub method: Method,
    /// Path beginning with `/`, e.g. `/blocks/tip/height`.
    pub path: String,
    /// Query parameters (GET only).
    pub query: Vec<(String, String)>,
    /// JSON body (POST only).
    pub body: Option<Bytes>,
    /// Response decoding mode.
    pub kind: ResponseKind,
}

impl EsploraRequest {
    /// A `GET` request for `path`.
    pub fn get(path: impl Into<String>, kind: ResponseKind) -> Self {
        Self { method: Method::Get, path: path.into(), query: Vec::new(), body: None, kind }
    }

    /// A `POST` request for `path` with a JSON body.
    pub fn post(path: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            kind: ResponseKind::Json,
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// A request bound to a concrete host, as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Target host.
    pub address: HostAddress,
    /// The logical request.
    pub request: EsploraRequest,
}

impl TransportRequest {
    /// Bind `request` to `address`.
    #[must_use]
    pub const fn new(address: HostAddress, request: EsploraRequest) -> Self {
        Self { address, request }
    }
}
