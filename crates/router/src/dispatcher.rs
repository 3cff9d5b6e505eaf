//! Request dispatcher with host-failure isolation and a single retry.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{task::JoinHandle, time::Instant};
use tomahawk_config::EsploraConfig;
use tomahawk_traits::{Rankable, Transport};
use tomahawk_types::{EsploraRequest, HostAddress, ResponseKind, TomahawkError, TransportRequest};

use crate::{
    Host, HostRegistry, metrics,
    prober::{DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT, HealthProber},
    registry::DEFAULT_MAX_FAILURES,
    retry::RetryPolicy,
    transport::BoxedTransport,
};

/// Default timeout of one live request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Router timing and threshold settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Timeout of one physical live request.
    pub request_timeout: Duration,
    /// Timeout of one health probe.
    pub probe_timeout: Duration,
    /// Sleep between probe rounds.
    pub poll_interval: Duration,
    /// Consecutive failures tolerated before an election.
    pub max_failures: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

impl From<&EsploraConfig> for RouterConfig {
    fn from(config: &EsploraConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            probe_timeout: config.probe_timeout(),
            poll_interval: config.poll_interval(),
            max_failures: config.max_failures,
        }
    }
}

#[derive(Debug)]
struct RouterInner {
    registry: Arc<HostRegistry>,
    transport: BoxedTransport,
    config: RouterConfig,
}

/// Routes live requests to the active Esplora host.
///
/// Cheap to clone; clones share the registry and transport.
#[derive(Debug, Clone)]
pub struct FailoverRouter {
    inner: Arc<RouterInner>,
}

impl FailoverRouter {
    /// Create a router over a primary host and its fallback mirrors.
    pub fn new<T: Transport>(
        primary: HostAddress,
        mirrors: impl IntoIterator<Item = HostAddress>,
        transport: T,
        config: RouterConfig,
    ) -> Self {
        let registry = Arc::new(HostRegistry::new(primary, mirrors, config.max_failures));
        Self {
            inner: Arc::new(RouterInner {
                registry,
                transport: BoxedTransport::new(transport),
                config,
            }),
        }
    }

    /// The shared host registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.inner.registry
    }

    /// Router settings.
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// A prober bound to this router's registry and transport.
    #[must_use]
    pub fn prober(&self) -> HealthProber {
        HealthProber::new(
            Arc::clone(&self.inner.registry),
            self.inner.transport.clone(),
            self.inner.config.probe_timeout,
            self.inner.config.poll_interval,
        )
    }

    /// Spawn the background prober.
    ///
    /// Returns `None` without spawning anything when only one host is
    /// configured. Must be called from within a tokio runtime.
    pub fn start_health_checks(&self) -> Option<JoinHandle<()>> {
        if !self.inner.registry.is_multihost() {
            debug!("Single esplora host configured, health checks disabled");
            return None;
        }
        info!(
            hosts = self.inner.registry.len(),
            interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "Starting esplora health checks"
        );
        Some(tokio::spawn(Arc::new(self.prober()).run()))
    }

    /// Execute one logical request.
    ///
    /// Makes at most two physical attempts: a connection-refused failure on
    /// the first one is retried once against the registry's candidate host.
    ///
    /// Errors that are not the host's fault (see
    /// [`TomahawkError::penalizes_host`]) are returned unchanged and never
    /// counted. A host that cannot be connected to is also marked
    /// unreachable until its next success or probe.
    ///
    /// # Errors
    ///
    /// Returns [`TomahawkError::NotFound`] unchanged, the first error when no
    /// retry is made, and [`TomahawkError::AllHostsExhausted`] when the retry
    /// fails too.
    pub async fn execute(&self, request: &EsploraRequest) -> Result<Bytes, TomahawkError> {
        let registry = &self.inner.registry;
        let mut policy = RetryPolicy::default();
        let mut host = registry.get_active();

        loop {
            let error = match self.attempt(&host, request).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.penalizes_host() => return Err(e),
                Err(e) => e,
            };

            let candidate = if error.is_connection_error() {
                registry.record_unreachable(host.id())
            } else {
                registry.record_failure(host.id())
            };
            match policy.retry(&error, registry.is_multihost()) {
                Some(next) => {
                    warn!(
                        from = %host.address(),
                        to = %candidate.address(),
                        path = %request.path,
                        "Esplora connection refused, retrying"
                    );
                    metrics::record_retry();
                    policy = next;
                    host = candidate;
                }
                None if policy.is_first_attempt() => return Err(error),
                None => return Err(TomahawkError::AllHostsExhausted { last: Box::new(error) }),
            }
        }
    }

    /// `GET` `path`.
    ///
    /// # Errors
    ///
    /// See [`FailoverRouter::execute`].
    pub async fn get(&self, path: impl Into<String>, kind: ResponseKind) -> Result<Bytes, TomahawkError> {
        self.execute(&EsploraRequest::get(path, kind)).await
    }

    /// `GET` `path` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`FailoverRouter::execute`].
    pub async fn get_with_query<V: std::fmt::Display>(
        &self,
        path: impl Into<String>,
        query: &[(&str, V)],
        kind: ResponseKind,
    ) -> Result<Bytes, TomahawkError> {
        let request =
            query.iter().fold(EsploraRequest::get(path, kind), |req, (k, v)| req.with_query(*k, v));
        self.execute(&request).await
    }

    /// `POST` a JSON body to `path`.
    ///
    /// # Errors
    ///
    /// See [`FailoverRouter::execute`].
    pub async fn post(&self, path: impl Into<String>, body: Bytes) -> Result<Bytes, TomahawkError> {
        self.execute(&EsploraRequest::post(path, body)).await
    }

    /// One physical attempt against `host`, recording its outcome.
    async fn attempt(&self, host: &Host, request: &EsploraRequest) -> Result<Bytes, TomahawkError> {
        let address = host.address();
        let call = self.inner.transport.call(TransportRequest::new(address.clone(), request.clone()));
        let start = Instant::now();

        let result = tokio::time::timeout(self.inner.config.request_timeout, call)
            .await
            .unwrap_or_else(|_| Err(TomahawkError::Timeout { host: address.to_string() }));

        match &result {
            Ok(_) => {
                self.inner.registry.record_success(host.id());
                metrics::record_request_latency(address, start.elapsed().as_secs_f64() * 1000.0);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(host = %address, path = %request.path, error = %e, "Esplora request failed");
                metrics::record_request_error(address, e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use tomahawk_config::TomahawkConfig;
    use tomahawk_test_utils::{MockResponse, MockTransport, TestConfigBuilder};

    use super::*;

    fn url(name: &str) -> HostAddress {
        HostAddress::url(format!("http://{name}.local"))
    }

    fn router(mock: &MockTransport, mirrors: usize) -> FailoverRouter {
        FailoverRouter::new(
            url("primary"),
            (0..mirrors).map(|i| url(&format!("mirror{i}"))),
            mock.clone(),
            RouterConfig::default(),
        )
    }

    fn tip() -> EsploraRequest {
        EsploraRequest::get("/blocks/tip/hash", ResponseKind::Json)
    }

    #[test]
    fn test_config_from_esplora_section() {
        let toml = TestConfigBuilder::new()
            .with_request_timeout_ms(1_500)
            .with_fallback_timeout_ms(700)
            .with_poll_interval_ms(30_000)
            .with_max_failures(3)
            .build_toml();
        let config = TomahawkConfig::parse(&toml).unwrap();

        let router = RouterConfig::from(&config.esplora);

        assert_eq!(router.request_timeout, Duration::from_millis(1_500));
        assert_eq!(router.probe_timeout, Duration::from_millis(700));
        assert_eq!(router.poll_interval, Duration::from_secs(30));
        assert_eq!(router.max_failures, 3);
    }

    #[test]
    fn test_default_section_matches_default_config() {
        assert_eq!(RouterConfig::from(&TomahawkConfig::default().esplora), RouterConfig::default());
    }

    #[tokio::test]
    async fn test_success_returns_body_unmodified() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::Body(Bytes::from_static(b"00000000abc")));
        let router = router(&mock, 1);

        assert_eq!(router.execute(&tip()).await.unwrap(), Bytes::from_static(b"00000000abc"));
        assert_eq!(mock.calls_to(&url("primary")), 1);
        assert_eq!(mock.calls_to(&url("mirror0")), 0);
    }

    #[tokio::test]
    async fn test_refused_retries_once_on_fallback() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::Refused);
        mock.push(&url("mirror0"), MockResponse::Body(Bytes::from_static(b"ok")));
        let router = router(&mock, 1);

        assert_eq!(router.execute(&tip()).await.unwrap(), Bytes::from_static(b"ok"));
        assert_eq!(mock.calls(), 2);
        assert_eq!(router.registry().get_active().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_refused_marks_host_unreachable_until_success() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::Refused);
        mock.push(&url("mirror0"), MockResponse::Body(Bytes::from_static(b"ok")));
        mock.set_default(&url("primary"), MockResponse::Body(Bytes::from_static(b"ok")));
        let router = router(&mock, 1);

        router.execute(&tip()).await.unwrap();
        let snapshot = router.registry().snapshot();
        let primary = snapshot.active().unwrap();
        assert!(primary.is_unreachable());
        assert_eq!(primary.failure_count(), 1);
        assert_eq!(snapshot.hosts()[0].address(), &url("mirror0"));

        router.execute(&tip()).await.unwrap();
        let primary = router.registry().get_active();
        assert!(!primary.is_unreachable());
        assert_eq!(primary.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_marks_unreachable_without_retry() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::ConnectionError);
        let router = router(&mock, 1);

        let err = router.execute(&tip()).await.unwrap_err();
        assert!(matches!(err, TomahawkError::Connection { .. }));
        assert_eq!(mock.calls(), 1);
        assert!(router.registry().get_active().is_unreachable());
    }

    #[tokio::test]
    async fn test_internal_error_is_not_penalized() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::Internal("no unix sockets".into()));
        let router = router(&mock, 1);

        let err = router.execute(&tip()).await.unwrap_err();
        assert!(matches!(err, TomahawkError::Internal(_)));
        assert_eq!(mock.calls(), 1);
        let primary = router.registry().get_active();
        assert_eq!(primary.failure_count(), 0);
        assert!(!primary.is_unreachable());
    }

    #[tokio::test]
    async fn test_double_failure_is_exhausted() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Refused);
        mock.set_default(&url("mirror0"), MockResponse::Refused);
        let router = router(&mock, 1);

        let err = router.execute(&tip()).await.unwrap_err();
        assert!(matches!(err, TomahawkError::AllHostsExhausted { .. }), "{err}");
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_penalized() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::NotFound);
        let router = router(&mock, 1);

        for _ in 0..10 {
            let err = router.execute(&tip()).await.unwrap_err();
            assert!(err.is_not_found());
        }
        assert_eq!(mock.calls(), 10);
        let active = router.registry().get_active();
        assert_eq!(active.address(), &url("primary"));
        assert_eq!(active.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_is_not_retried() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::Status(500));
        let router = router(&mock, 1);

        let err = router.execute(&tip()).await.unwrap_err();
        assert!(matches!(err, TomahawkError::Upstream { status: 500, .. }));
        assert_eq!(mock.calls(), 1);
        assert_eq!(router.registry().get_active().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_single_host_refused_propagates() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Refused);
        let router = router(&mock, 0);

        let err = router.execute(&tip()).await.unwrap_err();
        assert!(err.is_connection_refused());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_times_out_and_penalizes() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::Hang);
        let router = router(&mock, 1);

        let start = Instant::now();
        let err = router.execute(&tip()).await.unwrap_err();
        assert!(matches!(err, TomahawkError::Timeout { .. }));
        assert!(start.elapsed() >= DEFAULT_REQUEST_TIMEOUT);
        // Timeouts are not retried.
        assert_eq!(mock.calls(), 1);
        assert_eq!(router.registry().get_active().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_success_decrements_failures() {
        let mock = MockTransport::new();
        mock.push(&url("primary"), MockResponse::Status(502));
        mock.push(&url("primary"), MockResponse::Status(502));
        mock.set_default(&url("primary"), MockResponse::Body(Bytes::from_static(b"1")));
        let router = router(&mock, 1);

        let _ = router.execute(&tip()).await;
        let _ = router.execute(&tip()).await;
        assert_eq!(router.registry().get_active().failure_count(), 2);
        router.execute(&tip()).await.unwrap();
        assert_eq!(router.registry().get_active().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_get_carries_query() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Body(Bytes::from_static(b"[]")));
        let router = router(&mock, 0);

        router
            .get_with_query("/internal/mempool/txs", &[("max_txs", 50)], ResponseKind::Json)
            .await
            .unwrap();
        let requests = mock.requests();
        assert_eq!(requests[0].request.query, vec![("max_txs".to_string(), "50".to_string())]);
    }

    #[tokio::test]
    async fn test_single_host_has_no_prober() {
        let router = router(&MockTransport::new(), 0);
        assert!(router.start_health_checks().is_none());
    }

    #[tokio::test]
    async fn test_multihost_spawns_prober() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Height(1));
        mock.set_default(&url("mirror0"), MockResponse::Height(1));
        let handle = router(&mock, 1).start_health_checks().unwrap();
        handle.abort();
    }
}
