#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tomahawk-rs/tomahawk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tomahawk_types::{HostAddress, TomahawkError, TransportRequest};

// ============================================================================
// Mock Transport
// ============================================================================

/// Scripted outcome of one mock request.
///
/// # Example
///
/// ```
/// use tomahawk_test_utils::MockResponse;
///
/// let height = MockResponse::Height(840_000);
/// let refused = MockResponse::Refused;
/// let tx = MockResponse::json(serde_json::json!({ "txid": "ab" }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// `200 OK` with this body.
    Body(Bytes),
    /// `200 OK` with a plain-text block height.
    Height(u64),
    /// `404 Not Found`.
    NotFound,
    /// Connection refused.
    Refused,
    /// Connection dropped mid-request.
    ConnectionError,
    /// Non-2xx status.
    Status(u16),
    /// Never answers.
    Hang,
    /// Fails inside the transport without touching the host.
    Internal(String),
}

impl MockResponse {
    /// `200 OK` with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        Self::Body(Bytes::from(value.to_string()))
    }

    /// `200 OK` with a plain-text body.
    pub fn text(text: &str) -> Self {
        Self::Body(Bytes::copy_from_slice(text.as_bytes()))
    }
}

#[derive(Debug, Default)]
struct MockState {
    queues: HashMap<HostAddress, VecDeque<MockResponse>>,
    defaults: HashMap<HostAddress, MockResponse>,
    latency: HashMap<HostAddress, Duration>,
    requests: Vec<TransportRequest>,
}

/// A scripted transport for testing.
///
/// Responses are scripted per host address: queued responses are consumed in
/// FIFO order, then the host's default applies. A host with neither refuses
/// the connection. Clones share their script and call log, so a clone handed
/// to a router can be inspected from the test.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tomahawk_test_utils::{MockResponse, MockTransport};
/// use tomahawk_types::HostAddress;
///
/// let primary = HostAddress::url("http://primary.local");
/// let mock = MockTransport::new();
/// mock.push(&primary, MockResponse::Refused);
/// mock.set_default(&primary, MockResponse::Height(100));
/// mock.set_latency(&primary, Duration::from_millis(10));
///
/// assert_eq!(mock.calls(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock transport with no scripted hosts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `address`.
    pub fn push(&self, address: &HostAddress, response: MockResponse) {
        self.state.lock().queues.entry(address.clone()).or_default().push_back(response);
    }

    /// Set the response used once the queue for `address` is empty.
    pub fn set_default(&self, address: &HostAddress, response: MockResponse) {
        self.state.lock().defaults.insert(address.clone(), response);
    }

    /// Set simulated latency for `address`.
    pub fn set_latency(&self, address: &HostAddress, latency: Duration) {
        self.state.lock().latency.insert(address.clone(), latency);
    }

    /// Builder form of [`MockTransport::set_default`].
    #[must_use]
    pub fn with_default(self, address: &HostAddress, response: MockResponse) -> Self {
        self.set_default(address, response);
        self
    }

    /// Total number of calls.
    pub fn calls(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Number of calls sent to `address`.
    pub fn calls_to(&self, address: &HostAddress) -> usize {
        self.state.lock().requests.iter().filter(|r| &r.address == address).count()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state.lock().requests.clone()
    }

    /// Forget recorded requests, keeping the script.
    pub fn reset_calls(&self) {
        self.state.lock().requests.clear();
    }

    fn next_response(&self, request: &TransportRequest) -> (MockResponse, Duration) {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        let address = &request.address;
        let latency = state.latency.get(address).copied().unwrap_or_default();
        let response = state
            .queues
            .get_mut(address)
            .and_then(VecDeque::pop_front)
            .or_else(|| state.defaults.get(address).cloned())
            .unwrap_or(MockResponse::Refused);
        (response, latency)
    }
}

impl tower::Service<TransportRequest> for MockTransport {
    type Response = Bytes;
    type Error = TomahawkError;
    type Future = BoxFuture<'static, Result<Bytes, TomahawkError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: TransportRequest) -> Self::Future {
        let (response, latency) = self.next_response(&request);
        let host = request.address.to_string();
        let path = request.request.path;

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            match response {
                MockResponse::Body(body) => Ok(body),
                MockResponse::Height(height) => Ok(Bytes::from(height.to_string())),
                MockResponse::NotFound | MockResponse::Status(404) => {
                    Err(TomahawkError::NotFound { path })
                }
                MockResponse::Refused => Err(TomahawkError::ConnectionRefused { host }),
                MockResponse::ConnectionError => {
                    Err(TomahawkError::Connection { host, reason: "connection reset by peer".into() })
                }
                MockResponse::Status(status) => Err(TomahawkError::Upstream { host, status }),
                MockResponse::Hang => futures::future::pending().await,
                MockResponse::Internal(reason) => Err(TomahawkError::Internal(reason)),
            }
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Sample Esplora payloads.
pub mod fixtures {
    use serde_json::{Value, json};

    /// A 64 character hex id derived from `seed`.
    ///
    /// # Example
    ///
    /// ```
    /// use tomahawk_test_utils::fixtures;
    ///
    /// assert_eq!(fixtures::txid(1).len(), 64);
    /// ```
    pub fn txid(seed: u8) -> String {
        format!("{seed:02x}").repeat(32)
    }

    /// A confirmed transaction in Esplora's JSON format.
    pub fn transaction(txid: &str) -> Value {
        json!({
            "txid": txid,
            "version": 2,
            "locktime": 0,
            "size": 222,
            "weight": 561,
            "fee": 1410,
            "vin": [{
                "txid": "4d2a1d1f1d8e4d7e7bd9c0c2d0f1f5bb3c2d1e0f9e8d7c6b5a49382716051423",
                "vout": 1,
                "is_coinbase": false,
                "sequence": 4_294_967_293u64
            }],
            "vout": [{
                "scriptpubkey": "0014a9f5b4c1d2e3f40516273849aabbccddeeff0011",
                "scriptpubkey_type": "v0_p2wpkh",
                "value": 150_000
            }],
            "status": {
                "confirmed": true,
                "block_height": 840_000,
                "block_hash": "0000000000000000000320283a032748cef8227873ff4872689bf23f1cda83a5",
                "block_time": 1_713_571_767
            }
        })
    }

    /// A block summary in Esplora's JSON format.
    pub fn block(hash: &str, height: u64) -> Value {
        json!({
            "id": hash,
            "height": height,
            "version": 536_870_912,
            "timestamp": 1_713_571_767,
            "tx_count": 3050,
            "size": 2_325_617,
            "weight": 3_993_281,
            "merkle_root": "031b417c3a1828ddf3d6527fc210daafcc9218e81f98257f88d4d43bd7a5894f",
            "previousblockhash": "0000000000000000000172014ba58d66455762add0512355ad651207918494ab",
            "nonce": 3_932_395_645u64,
            "bits": 386_089_497
        })
    }

    /// An outspend; `spent` selects a spending transaction.
    pub fn outspend(spent: bool) -> Value {
        if spent {
            json!({ "spent": true, "txid": txid(0xee), "vin": 0, "status": { "confirmed": false } })
        } else {
            json!({ "spent": false })
        }
    }
}

// ============================================================================
// Async Test Helpers
// ============================================================================

/// Run a future with a timeout.
///
/// `Ok(T)` if the future completes in time, `Err("timeout")` otherwise.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tomahawk_test_utils::with_timeout;
///
/// #[tokio::main]
/// async fn main() {
///     let result = with_timeout(async { 42 }, Duration::from_secs(1)).await;
///     assert_eq!(result, Ok(42));
/// }
/// ```
pub async fn with_timeout<F, T>(future: F, timeout: Duration) -> Result<T, &'static str>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future).await.map_err(|_| "timeout")
}

/// Assert that a future completes within a timeout.
#[macro_export]
macro_rules! assert_completes {
    ($future:expr, $timeout:expr) => {
        $crate::with_timeout($future, $timeout).await.expect("future did not complete in time")
    };
}

/// Assert that a future times out.
#[macro_export]
macro_rules! assert_times_out {
    ($future:expr, $timeout:expr) => {
        match $crate::with_timeout($future, $timeout).await {
            Err(_) => {}
            Ok(_) => panic!("expected future to time out, but it completed"),
        }
    };
}

// ============================================================================
// Test Configuration Builder
// ============================================================================

/// Builder for test configuration files.
///
/// Generates TOML configuration strings suitable for testing.
///
/// # Example
///
/// ```
/// use tomahawk_test_utils::TestConfigBuilder;
///
/// let config = TestConfigBuilder::new()
///     .with_rest_api_url("http://127.0.0.1:3000")
///     .with_fallback("https://mirror.example.com/api")
///     .with_max_failures(3)
///     .build_toml();
///
/// assert!(config.contains("[esplora]"));
/// assert!(config.contains("mirror.example.com"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TestConfigBuilder {
    rest_api_url: Option<String>,
    unix_socket_path: Option<String>,
    fallback: Vec<String>,
    request_timeout_ms: Option<u64>,
    fallback_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_failures: Option<u32>,
    server_port: Option<u16>,
    metrics_enabled: bool,
}

impl TestConfigBuilder {
    /// Create a new test configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary host URL.
    #[must_use]
    pub fn with_rest_api_url(mut self, url: &str) -> Self {
        self.rest_api_url = Some(url.to_string());
        self
    }

    /// Reach the primary host over a UNIX socket.
    #[must_use]
    pub fn with_unix_socket(mut self, path: &str) -> Self {
        self.unix_socket_path = Some(path.to_string());
        self
    }

    /// Add a fallback mirror.
    #[must_use]
    pub fn with_fallback(mut self, url: &str) -> Self {
        self.fallback.push(url.to_string());
        self
    }

    /// Set the live request timeout.
    #[must_use]
    pub const fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = Some(ms);
        self
    }

    /// Set the probe timeout.
    #[must_use]
    pub const fn with_fallback_timeout_ms(mut self, ms: u64) -> Self {
        self.fallback_timeout_ms = Some(ms);
        self
    }

    /// Set the probe interval.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = Some(ms);
        self
    }

    /// Set the failure threshold.
    #[must_use]
    pub const fn with_max_failures(mut self, max: u32) -> Self {
        self.max_failures = Some(max);
        self
    }

    /// Set the passthrough server port.
    #[must_use]
    pub const fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }

    /// Enable the metrics exporter.
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Build the configuration as a TOML string.
    pub fn build_toml(self) -> String {
        let mut toml = String::from("[esplora]\n");
        if let Some(url) = &self.rest_api_url {
            toml.push_str(&format!("rest_api_url = \"{url}\"\n"));
        }
        if let Some(path) = &self.unix_socket_path {
            toml.push_str(&format!("unix_socket_path = \"{path}\"\n"));
        }
        if !self.fallback.is_empty() {
            let mirrors: Vec<_> = self.fallback.iter().map(|m| format!("\"{m}\"")).collect();
            toml.push_str(&format!("fallback = [{}]\n", mirrors.join(", ")));
        }
        if let Some(ms) = self.request_timeout_ms {
            toml.push_str(&format!("request_timeout_ms = {ms}\n"));
        }
        if let Some(ms) = self.fallback_timeout_ms {
            toml.push_str(&format!("fallback_timeout_ms = {ms}\n"));
        }
        if let Some(ms) = self.poll_interval_ms {
            toml.push_str(&format!("poll_interval_ms = {ms}\n"));
        }
        if let Some(max) = self.max_failures {
            toml.push_str(&format!("max_failures = {max}\n"));
        }
        toml.push('\n');

        if let Some(port) = self.server_port {
            toml.push_str("[server]\n");
            toml.push_str(&format!("port = {port}\n\n"));
        }

        if self.metrics_enabled {
            toml.push_str("[metrics]\n");
            toml.push_str("enabled = true\n\n");
        }

        toml
    }
}

// ============================================================================
// Tests
// ============================================================================
