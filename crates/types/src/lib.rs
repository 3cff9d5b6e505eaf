#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tomahawk-rs/tomahawk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod address;
pub use address::HostAddress;

mod error;
pub use error::TomahawkError;

mod request;
pub use request::{EsploraRequest, Method, ResponseKind, TransportRequest};

/// Chain tip height as reported by an Esplora host.
pub type BlockHeight = u64;
