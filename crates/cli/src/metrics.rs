//! Prometheus metrics exporter.
//!
//! The router records through the `metrics` facade; this installs the
//! Prometheus recorder behind it and renders the scrape output.

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installed Prometheus recorder.
#[derive(Debug, Clone)]
pub struct TomahawkMetrics {
    handle: PrometheusHandle,
}

impl TomahawkMetrics {
    /// Install the Prometheus recorder as the global metrics recorder.
    ///
    /// Only one recorder can be installed per process.
    ///
    /// # Errors
    ///
    /// Returns an error if a recorder has already been installed.
    pub fn new() -> eyre::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Ok(Self { handle })
    }

    /// Metrics in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// `GET /metrics` handler.
pub async fn metrics_handler(State(metrics): State<Arc<TomahawkMetrics>>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], metrics.render())
}
