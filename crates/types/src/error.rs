//! Error types for the tomahawk router.

use derive_more::{Debug, Display, Error};

/// Error type surfaced by transports, the dispatcher and the client facade.
#[derive(Debug, Display, Error)]
#[error(ignore)]
pub enum TomahawkError {
    /// The host answered with a "not found" status.
    ///
    /// This is a valid application-level answer and never counts against the host.
    #[display("not found: {path}")]
    NotFound {
        /// Request path that was not found.
        path: String,
    },

    /// The host refused the connection.
    #[display("connection refused: {host}")]
    ConnectionRefused {
        /// Host that refused the connection.
        host: String,
    },

    /// Any other transport-level failure (reset, DNS, broken body).
    #[display("connection error on {host}: {reason}")]
    Connection {
        /// Host the connection failed on.
        host: String,
        /// Transport error message.
        reason: String,
    },

    /// The host did not answer within the configured timeout.
    #[display("request timeout: {host}")]
    Timeout {
        /// Host that timed out.
        host: String,
    },

    /// The host answered with a non-success status other than not found.
    #[display("upstream error from {host}: status {status}")]
    Upstream {
        /// Host that returned the status.
        host: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request failed on the active host and again on the single retry.
    #[display("all hosts exhausted, last error: {last}")]
    AllHostsExhausted {
        /// Error returned by the retry attempt.
        last: Box<TomahawkError>,
    },

    /// A response body could not be decoded into the expected shape.
    #[display("failed to decode response: {_0}")]
    Decode(String),

    /// The operation is not supported by this backend.
    #[display("method {_0} not implemented")]
    NotImplemented(&'static str),

    /// Internal error.
    #[display("internal error: {_0}")]
    Internal(String),
}

impl TomahawkError {
    /// Whether this error is a host-level fault that counts against the host.
    #[must_use]
    pub const fn penalizes_host(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused { .. }
                | Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::Upstream { .. }
        )
    }

    /// Whether the host refused the connection outright.
    #[must_use]
    pub const fn is_connection_refused(&self) -> bool {
        matches!(self, Self::ConnectionRefused { .. })
    }

    /// Whether the host could not be talked to at all.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionRefused { .. } | Self::Connection { .. })
    }

    /// Whether the host answered "not found".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::AllHostsExhausted { last } => last.is_not_found(),
            _ => false,
        }
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ConnectionRefused { .. } => "connection_refused",
            Self::Connection { .. } => "connection",
            Self::Timeout { .. } => "timeout",
            Self::Upstream { .. } => "upstream",
            Self::AllHostsExhausted { .. } => "all_hosts_exhausted",
            Self::Decode(_) => "decode",
            Self::NotImplemented(_) => "not_implemented",
            Self::Internal(_) => "internal",
        }
    }
}
