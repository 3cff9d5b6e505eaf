//! Router metrics.
//!
//! Recorded through the [`metrics`](::metrics) facade; they are no-ops until
//! a recorder (e.g. the Prometheus exporter installed by the CLI) is set.
//!
//! All metrics use the `tomahawk_` prefix:
//! - `tomahawk_host_rtt_ms` / `tomahawk_host_height` / `tomahawk_host_healthy` / `tomahawk_host_active` gauges per host
//! - `tomahawk_host_failures` gauge per host
//! - `tomahawk_elections_total` counter by reason
//! - `tomahawk_request_errors_total` counter by host and error kind
//! - `tomahawk_retries_total` counter
//! - `tomahawk_request_duration_ms` histogram per host

use ::metrics::{counter, gauge, histogram};
use tomahawk_traits::Rankable;
use tomahawk_types::{HostAddress, TomahawkError};

use crate::{RegistrySnapshot, registry::Election};

/// Publish per-host gauges from a registry snapshot.
pub(crate) fn record_snapshot(snapshot: &RegistrySnapshot) {
    for host in snapshot.hosts() {
        let label = host.address().to_string();
        if host.rtt().is_finite() {
            gauge!("tomahawk_host_rtt_ms", "host" => label.clone()).set(host.rtt());
        }
        if let Some(height) = host.latest_height() {
            gauge!("tomahawk_host_height", "host" => label.clone()).set(height as f64);
        }
        gauge!("tomahawk_host_healthy", "host" => label.clone())
            .set(if host.is_degraded() { 0.0 } else { 1.0 });
        gauge!("tomahawk_host_failures", "host" => label.clone()).set(f64::from(host.failure_count()));
        gauge!("tomahawk_host_active", "host" => label)
            .set(if snapshot.is_active(host) { 1.0 } else { 0.0 });
    }
}

/// Count a committed election.
pub(crate) fn record_election(election: &Election) {
    counter!("tomahawk_elections_total", "reason" => election.reason.to_string()).increment(1);
}

/// Count a failed live request.
pub(crate) fn record_request_error(host: &HostAddress, error: &TomahawkError) {
    counter!(
        "tomahawk_request_errors_total",
        "host" => host.to_string(),
        "kind" => error.kind()
    )
    .increment(1);
}

/// Record the duration of one physical live request.
pub(crate) fn record_request_latency(host: &HostAddress, duration_ms: f64) {
    histogram!("tomahawk_request_duration_ms", "host" => host.to_string()).record(duration_ms);
}

/// Count a retry against the fallback host.
pub(crate) fn record_retry() {
    counter!("tomahawk_retries_total").increment(1);
}
