use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A transaction output reference.
///
/// Displays as `txid:vout`, the form the batched outspend endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{txid}:{vout}")]
pub struct Outpoint {
    /// Transaction id, hex.
    pub txid: String,
    /// Output index.
    pub vout: u32,
}

impl Outpoint {
    /// Create an outpoint.
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self { txid: txid.into(), vout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Outpoint::new("ab", 3).to_string(), "ab:3");
    }
}
