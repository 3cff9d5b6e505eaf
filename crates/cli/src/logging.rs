//! Logging and tracing utilities for tomahawk.
//!
//! This module provides tracing initialization and configuration logging.

use eyre::{Context, Result};
use tomahawk_config::TomahawkConfig;

/// Initialize the tracing subscriber for logging.
///
/// # Arguments
///
/// * `level` - The log filter (e.g. `info`, `tomahawk_router=debug`)
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be initialized.
pub fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .wrap_err("failed to create log filter")?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .wrap_err("failed to install tracing subscriber")?;

    Ok(())
}

/// Logs configuration summaries at startup.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

impl Logger {
    /// Create a new Logger instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Log a summary of the configuration at startup.
    pub fn log(&self, config: &TomahawkConfig) {
        let esplora = &config.esplora;

        info!(primary = %esplora.primary_address(), "Primary esplora host");

        info!(count = esplora.fallback.len(), "Fallback mirrors configured");

        for mirror in &esplora.fallback {
            debug!(url = %mirror, "Fallback mirror");
        }

        info!(
            request_timeout_ms = esplora.request_timeout_ms,
            fallback_timeout_ms = esplora.fallback_timeout_ms,
            poll_interval_ms = esplora.poll_interval_ms,
            max_failures = esplora.max_failures,
            "Failover settings"
        );

        info!(host = %config.server.host, port = config.server.port, "Server configuration");

        if config.metrics.enabled {
            info!(host = %config.metrics.host, port = config.metrics.port, "Metrics enabled");
        }
    }
}
