#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tomahawk-rs/tomahawk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::{path::Path, time::Duration};

use eyre::{Context, bail, ensure};
use serde::{Deserialize, Serialize};
use tomahawk_types::HostAddress;

/// Default primary Esplora REST API URL.
pub const DEFAULT_REST_API_URL: &str = "http://127.0.0.1:3000";
/// Default live request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Default health probe timeout in milliseconds.
pub const DEFAULT_FALLBACK_TIMEOUT_MS: u64 = 5_000;
/// Default interval between health probe rounds in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
/// Default number of consecutive failures tolerated before an election.
pub const DEFAULT_MAX_FAILURES: u32 = 5;
/// Default server host address.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default passthrough server port.
pub const DEFAULT_PORT: u16 = 8999;
/// Default metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Esplora backend configuration.
///
/// The primary host is reached over `unix_socket_path` when set, otherwise
/// over `rest_api_url`. `fallback` lists the mirror URLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EsploraConfig {
    /// Primary REST API base URL.
    pub rest_api_url: String,
    /// Primary UNIX socket path; overrides `rest_api_url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_socket_path: Option<String>,
    /// Fallback mirror base URLs.
    pub fallback: Vec<String>,
    /// Live request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Health probe timeout in milliseconds.
    pub fallback_timeout_ms: u64,
    /// Interval between health probe rounds in milliseconds.
    pub poll_interval_ms: u64,
    /// Consecutive failures tolerated before an election.
    pub max_failures: u32,
}

impl Default for EsploraConfig {
    fn default() -> Self {
        Self {
            rest_api_url: DEFAULT_REST_API_URL.to_string(),
            unix_socket_path: None,
            fallback: Vec::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            fallback_timeout_ms: DEFAULT_FALLBACK_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

impl EsploraConfig {
    /// Address of the primary host.
    #[must_use]
    pub fn primary_address(&self) -> HostAddress {
        match &self.unix_socket_path {
            Some(path) => HostAddress::socket(path),
            None => HostAddress::url(&self.rest_api_url),
        }
    }

    /// Addresses of the fallback mirrors, in configuration order.
    #[must_use]
    pub fn fallback_addresses(&self) -> Vec<HostAddress> {
        self.fallback.iter().map(HostAddress::url).collect()
    }

    /// Live request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Health probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    /// Interval between probe rounds.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Passthrough HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.to_string(), port: DEFAULT_PORT }
    }
}

/// Metrics configuration.
///
/// Controls the Prometheus metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Host address for the metrics server.
    pub host: String,
    /// Port for the metrics server.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, host: DEFAULT_HOST.to_string(), port: DEFAULT_METRICS_PORT }
    }
}

/// Root configuration for tomahawk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TomahawkConfig {
    /// Esplora backend configuration.
    pub esplora: EsploraConfig,
    /// Passthrough server configuration.
    pub server: ServerConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl TomahawkConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if validation fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use tomahawk_config::TomahawkConfig;
    ///
    /// let config = TomahawkConfig::from_file(Path::new("tomahawk.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or if validation fails.
    ///
    /// # Example
    ///
    /// ```
    /// use tomahawk_config::TomahawkConfig;
    ///
    /// let toml = r#"
    /// [esplora]
    /// rest_api_url = "http://127.0.0.1:3000"
    /// fallback = ["https://mirror.example.com/api"]
    /// "#;
    ///
    /// let config = TomahawkConfig::parse(toml).unwrap();
    /// assert_eq!(config.esplora.fallback.len(), 1);
    /// ```
    pub fn parse(s: &str) -> eyre::Result<Self> {
        let config: Self = toml::from_str(s).wrap_err("failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Checks that:
    /// - The primary host is set
    /// - Fallback URLs are non-empty, unique and differ from the primary
    /// - Timeouts, the probe interval and the failure threshold are non-zero
    /// - Port numbers are valid (non-zero)
    ///
    /// # Errors
    ///
    /// Returns an error describing any validation failures.
    pub fn validate(&self) -> eyre::Result<()> {
        let esplora = &self.esplora;

        match &esplora.unix_socket_path {
            Some(path) => ensure!(!path.is_empty(), "unix socket path must not be empty"),
            None => ensure!(!esplora.rest_api_url.is_empty(), "rest api url must not be empty"),
        }

        let mut mirrors = std::collections::HashSet::new();
        for url in &esplora.fallback {
            ensure!(!url.is_empty(), "fallback url must not be empty");
            ensure!(mirrors.insert(url), "duplicate fallback url: {url}");
            if esplora.unix_socket_path.is_none() && *url == esplora.rest_api_url {
                bail!("fallback url '{url}' is the primary host");
            }
        }

        ensure!(esplora.request_timeout_ms > 0, "request timeout must be greater than 0");
        ensure!(esplora.fallback_timeout_ms > 0, "fallback timeout must be greater than 0");
        ensure!(esplora.poll_interval_ms > 0, "poll interval must be greater than 0");
        ensure!(esplora.max_failures > 0, "max failures must be greater than 0");

        ensure!(self.server.port > 0, "server port must be greater than 0");

        if self.metrics.enabled {
            ensure!(self.metrics.port > 0, "metrics port must be greater than 0");
        }

        Ok(())
    }

    /// Serialize the configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> eyre::Result<String> {
        toml::to_string_pretty(self).wrap_err("failed to serialize configuration to TOML")
    }
}
