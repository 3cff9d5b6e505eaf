#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tomahawk-rs/tomahawk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

mod dispatcher;
pub use dispatcher::{DEFAULT_REQUEST_TIMEOUT, FailoverRouter, RouterConfig};

mod host;
pub use host::{Host, MAX_HEIGHT_LAG, RTT_WINDOW, RttWindow};

mod http;
pub use http::{HttpTransport, HttpTransportConfig};

mod metrics;

mod prober;
pub use prober::{DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT, HealthProber, PROBE_PATH};

pub mod ranking;
pub use ranking::ElectionReason;

mod registry;
pub use registry::{
    DEFAULT_MAX_FAILURES, Election, HostRegistry, ProbeOutcome, ProbeResult, RegistrySnapshot,
};

mod retry;
pub use retry::RetryPolicy;

mod transport;
pub use transport::BoxedTransport;

pub use tomahawk_traits::{HostId, Rankable};
