//! Background health prober.
//!
//! Periodically fetches `/blocks/tip/height` from every host concurrently,
//! feeds the results into the [`HostRegistry`] and lets the ranking policy
//! decide whether the active host must change.

use std::{fmt::Write as _, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::future::join_all;
use tokio::time::Instant;
use tomahawk_traits::{HostId, Rankable};
use tomahawk_types::{BlockHeight, EsploraRequest, HostAddress, ResponseKind, TransportRequest};

use crate::{
    HostRegistry, RegistrySnapshot, metrics,
    registry::{ProbeOutcome, ProbeResult},
    transport::BoxedTransport,
};

/// Path probed on every host.
pub const PROBE_PATH: &str = "/blocks/tip/height";

/// Default interval between probe rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-host probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Background task measuring host health and latency.
#[derive(Debug)]
pub struct HealthProber {
    registry: Arc<HostRegistry>,
    transport: BoxedTransport,
    timeout: Duration,
    interval: Duration,
}

impl HealthProber {
    /// Create a new prober.
    ///
    /// # Arguments
    ///
    /// * `registry` - Registry to update
    /// * `transport` - Transport used for probe requests
    /// * `timeout` - Per-host probe timeout
    /// * `interval` - Sleep between the end of one round and the next
    #[must_use]
    pub const fn new(
        registry: Arc<HostRegistry>,
        transport: BoxedTransport,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self { registry, transport, timeout, interval }
    }

    /// Run the prober forever.
    ///
    /// Rounds never overlap: the interval is slept after each round settles.
    /// Stop it by aborting the task.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.probe_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Probe every host once and apply the round to the registry.
    pub async fn probe_once(&self) -> ProbeOutcome {
        let probes = self
            .registry
            .addresses()
            .into_iter()
            .map(|(id, address)| self.probe(id, address));
        let results = join_all(probes).await;

        let outcome = self.registry.apply_probe_round(results);
        debug!(max_height = outcome.max_height, "Esplora hosts:\n{}", ranking_table(&outcome.snapshot));
        metrics::record_snapshot(&outcome.snapshot);
        outcome
    }

    async fn probe(&self, id: HostId, address: HostAddress) -> (HostId, ProbeResult) {
        let request =
            TransportRequest::new(address.clone(), EsploraRequest::get(PROBE_PATH, ResponseKind::Json));
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.transport.call(request)).await {
            Ok(Ok(body)) => ProbeResult::Answered { rtt: start.elapsed(), height: parse_height(&body) },
            Ok(Err(e)) => {
                debug!(host = %address, error = %e, "Health probe failed");
                ProbeResult::Failed
            }
            Err(_) => {
                debug!(host = %address, timeout_ms = self.timeout.as_millis() as u64, "Health probe timed out");
                ProbeResult::Failed
            }
        };
        (id, result)
    }
}

/// Parse a plain-text tip height.
fn parse_height(body: &Bytes) -> Option<BlockHeight> {
    std::str::from_utf8(body).ok()?.trim().parse().ok()
}

/// Render the ranking table logged after each round.
fn ranking_table(snapshot: &RegistrySnapshot) -> String {
    let mut table = String::new();
    for host in snapshot.hosts() {
        let marker = if snapshot.is_active(host) { '*' } else { ' ' };
        let rtt = if host.rtt().is_finite() { format!("{:.0}ms", host.rtt()) } else { "-".to_string() };
        let reach = if host.is_unreachable() { "unreachable" } else { "reachable" };
        let height = host.latest_height().map_or_else(|| "??????".to_string(), |h| h.to_string());
        let sync = if host.is_out_of_sync() { "x" } else { "✓" };
        let _ = writeln!(table, "{marker} {rtt:>8} {reach:<11} {height:>8} {sync} {}", host.address());
    }
    table
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tomahawk_test_utils::{MockResponse, MockTransport};

    use super::*;
    use crate::ranking::ElectionReason;

    fn url(name: &str) -> HostAddress {
        HostAddress::url(format!("http://{name}.local"))
    }

    fn prober(mock: &MockTransport, mirrors: usize) -> (Arc<HostRegistry>, HealthProber) {
        let registry = Arc::new(HostRegistry::new(
            url("primary"),
            (0..mirrors).map(|i| url(&format!("mirror{i}"))),
            5,
        ));
        let prober = HealthProber::new(
            Arc::clone(&registry),
            BoxedTransport::new(mock.clone()),
            DEFAULT_PROBE_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
        );
        (registry, prober)
    }

    #[rstest]
    #[case::plain(b"812345".as_slice(), Some(812_345))]
    #[case::newline(b"812345\n".as_slice(), Some(812_345))]
    #[case::garbage(b"<html>".as_slice(), None)]
    #[case::empty(b"".as_slice(), None)]
    #[case::negative(b"-1".as_slice(), None)]
    fn test_parse_height(#[case] body: &[u8], #[case] expected: Option<BlockHeight>) {
        assert_eq!(parse_height(&Bytes::copy_from_slice(body)), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_round_updates_every_host() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Height(100));
        mock.set_latency(&url("primary"), Duration::from_millis(30));
        mock.set_default(&url("mirror0"), MockResponse::Height(99));
        mock.set_latency(&url("mirror0"), Duration::from_millis(10));
        let (registry, prober) = prober(&mock, 1);

        let outcome = prober.probe_once().await;
        assert_eq!(outcome.max_height, 100);
        assert!(outcome.election.is_none());

        let snapshot = registry.snapshot();
        // Preferred primary stays first despite the faster mirror.
        assert_eq!(snapshot.hosts()[0].address(), &url("primary"));
        assert!((30.0..31.0).contains(&snapshot.hosts()[0].rtt()));
        assert!((10.0..11.0).contains(&snapshot.hosts()[1].rtt()));
        assert_eq!(snapshot.hosts()[1].latest_height(), Some(99));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_host_does_not_delay_round() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Hang);
        mock.set_default(&url("mirror0"), MockResponse::Height(100));
        mock.set_latency(&url("mirror0"), Duration::from_millis(20));
        let (registry, prober) = prober(&mock, 1);

        let start = Instant::now();
        let outcome = prober.probe_once().await;
        // Bounded by the probe timeout, not the sum of host latencies.
        assert!(start.elapsed() >= DEFAULT_PROBE_TIMEOUT);
        assert!(start.elapsed() < DEFAULT_PROBE_TIMEOUT + Duration::from_millis(10));

        assert_eq!(outcome.election.unwrap().reason, ElectionReason::Unreachable);
        assert_eq!(registry.get_active().address(), &url("mirror0"));
        assert!((20.0..21.0).contains(&registry.get_active().rtt()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_height_marks_out_of_sync() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Body(Bytes::from_static(b"oops")));
        mock.set_default(&url("mirror0"), MockResponse::Height(100));
        let (registry, prober) = prober(&mock, 1);

        let outcome = prober.probe_once().await;
        assert_eq!(outcome.election.unwrap().reason, ElectionReason::OutOfSync);

        let snapshot = registry.snapshot();
        let primary = snapshot.hosts().iter().find(|h| h.is_preferred()).unwrap();
        assert!(primary.is_out_of_sync());
        assert!(!primary.is_unreachable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_between_rounds() {
        let mock = MockTransport::new();
        mock.set_default(&url("primary"), MockResponse::Height(100));
        mock.set_default(&url("mirror0"), MockResponse::Height(100));
        let (_registry, prober) = prober(&mock, 1);

        let handle = tokio::spawn(Arc::new(prober).run());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.calls(), 2);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
        assert_eq!(mock.calls(), 4);
        handle.abort();
    }

    #[test]
    fn test_ranking_table_marks_active() {
        let registry = HostRegistry::new(url("primary"), [url("mirror0")], 5);
        registry.apply_probe_round([
            (0, ProbeResult::Answered { rtt: Duration::from_millis(12), height: Some(100) }),
            (1, ProbeResult::Failed),
        ]);
        let table = ranking_table(&registry.snapshot());
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('*'));
        assert!(lines[0].contains("12ms"));
        assert!(lines[1].contains("unreachable"));
        assert!(lines[1].contains("??????"));
    }
}
