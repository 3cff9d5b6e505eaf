#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tomahawk-rs/tomahawk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub use tomahawk_client as client;
pub use tomahawk_config as config;
pub use tomahawk_router as router;
pub use tomahawk_traits as traits;
pub use tomahawk_types as types;

pub use tomahawk_client::{EsploraClient, Outpoint};
pub use tomahawk_config::TomahawkConfig;
pub use tomahawk_router::{FailoverRouter, HostRegistry, HttpTransport, RouterConfig};
pub use tomahawk_traits::{Rankable, Transport};
pub use tomahawk_types::{HostAddress, TomahawkError};

/// Build a client for the configured hosts over HTTP.
///
/// Health checks are not started; call
/// [`EsploraClient::start_health_checks`] from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn connect(config: &TomahawkConfig) -> Result<EsploraClient, TomahawkError> {
    let transport = HttpTransport::new(Default::default())?;
    let router = FailoverRouter::new(
        config.esplora.primary_address(),
        config.esplora.fallback_addresses(),
        transport,
        RouterConfig::from(&config.esplora),
    );
    Ok(EsploraClient::new(router))
}
