//! Transport trait for talking to a single Esplora host.

use bytes::Bytes;
use tomahawk_types::{TomahawkError, TransportRequest};
use tower::Service;

/// A transport that performs one physical request against the host named in
/// the [`TransportRequest`].
///
/// Any cloneable `tower::Service` with the right request, response and error
/// types is a transport; this trait only names that bound. Implementations
/// must map a 404 status to [`TomahawkError::NotFound`], a refused connection
/// to [`TomahawkError::ConnectionRefused`] and any other non-success status to
/// [`TomahawkError::Upstream`]. Timeouts are enforced by the caller.
pub trait Transport:
    Service<TransportRequest, Response = Bytes, Error = TomahawkError, Future: Send + 'static>
    + Clone
    + Send
    + 'static
{
}

impl<T> Transport for T where
    T: Service<TransportRequest, Response = Bytes, Error = TomahawkError, Future: Send + 'static>
        + Clone
        + Send
        + 'static
{
}
