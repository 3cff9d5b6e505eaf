//! Host addresses.

use std::path::PathBuf;

use derive_more::Display;

/// Connection target of an Esplora host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum HostAddress {
    /// Local UNIX domain socket path.
    #[display("unix:{}", _0.display())]
    Socket(PathBuf),
    /// Base URL, e.g. `https://mirror.example.com/api`.
    #[display("{_0}")]
    Url(String),
}

impl HostAddress {
    /// Create a socket address.
    pub fn socket(path: impl Into<PathBuf>) -> Self {
        Self::Socket(path.into())
    }

    /// Create a URL address.
    pub fn url(base: impl Into<String>) -> Self {
        Self::Url(base.into())
    }

    /// Whether this host is reached over a local socket.
    #[must_use]
    pub const fn is_socket(&self) -> bool {
        matches!(self, Self::Socket(_))
    }

    /// Resolve `path` against this address.
    ///
    /// For URLs this is the full request URL; for sockets it is the path
    /// itself, since the socket is the whole authority.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        match self {
            Self::Url(base) => format!("{}{}", base.trim_end_matches('/'), path),
            Self::Socket(_) => path.to_string(),
        }
    }
}
