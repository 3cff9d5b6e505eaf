#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tomahawk-rs/tomahawk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

mod builder;
pub use builder::{AppBuilder, build_app};

mod cli;
pub use cli::Cli;

mod error;
pub use error::ApiError;

mod http;
pub use http::{AppState, HostView, create_router, health_check, hosts};

mod logging;
pub use logging::{Logger, init_tracing};

mod metrics;
pub use metrics::{TomahawkMetrics, metrics_handler};

mod server;
pub use server::run_server;
