#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tomahawk-rs/tomahawk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod client;
pub use client::EsploraClient;

mod outpoint;
pub use outpoint::Outpoint;

/// A transaction as returned by Esplora.
pub type Transaction = serde_json::Value;

/// A block summary as returned by Esplora.
pub type Block = serde_json::Value;

/// The spending status of one output.
pub type Outspend = serde_json::Value;

/// Address statistics as returned by Esplora.
pub type Address = serde_json::Value;

/// Script hash statistics as returned by Esplora.
pub type ScriptHash = serde_json::Value;
