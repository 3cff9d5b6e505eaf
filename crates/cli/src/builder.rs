//! Application builder for constructing the tomahawk server.
//!
//! Wires configuration into an HTTP transport, a failover router and the
//! passthrough routes.

use std::sync::Arc;

use axum::Router;
use eyre::{Context, Result};
use tomahawk_client::EsploraClient;
use tomahawk_config::TomahawkConfig;
use tomahawk_router::{FailoverRouter, HttpTransport, HttpTransportConfig, RouterConfig};

use crate::{AppState, create_router};

/// Builder for constructing the tomahawk application.
///
/// # Example
///
/// ```ignore
/// use tomahawk_cli::AppBuilder;
/// use tomahawk_config::TomahawkConfig;
///
/// let config = TomahawkConfig::from_file("tomahawk.toml".as_ref())?;
/// let app = AppBuilder::new().build(&config)?;
/// ```
#[derive(Debug, Default)]
pub struct AppBuilder {
    transport: HttpTransportConfig,
}

impl AppBuilder {
    /// Create a new application builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP transport settings.
    #[must_use]
    pub fn with_transport_config(mut self, config: HttpTransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Build the Esplora client for the configured hosts.
    ///
    /// Health checks are not started.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn build_client(&self, config: &TomahawkConfig) -> Result<EsploraClient> {
        let transport = HttpTransport::new(self.transport.clone())
            .wrap_err("failed to create HTTP transport")?;

        let router = FailoverRouter::new(
            config.esplora.primary_address(),
            config.esplora.fallback_addresses(),
            transport,
            RouterConfig::from(&config.esplora),
        );
        debug!(hosts = router.registry().len(), "Created failover router");

        Ok(EsploraClient::new(router))
    }

    /// Build the application router from configuration.
    ///
    /// Spawns the health prober when more than one host is configured, so
    /// this must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the application cannot be built.
    pub fn build(self, config: &TomahawkConfig) -> Result<Router> {
        let client = self.build_client(config)?;

        if client.start_health_checks().is_none() {
            info!("Single esplora host, failover disabled");
        }

        Ok(create_router(Arc::new(AppState::new(client))))
    }
}

/// Build the application from configuration with default settings.
///
/// # Errors
///
/// Returns an error if the application cannot be built.
pub fn build_app(config: &TomahawkConfig) -> Result<Router> {
    AppBuilder::new().build(config)
}
