//! Type-erased transport shared by the dispatcher and the prober.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tomahawk_traits::Transport;
use tomahawk_types::{TomahawkError, TransportRequest};
use tower::{ServiceExt, util::BoxCloneService};

type Inner = BoxCloneService<TransportRequest, Bytes, TomahawkError>;

/// A type-erased [`Transport`].
///
/// `Clone + Send + Sync`, so it can live in shared state. Each call drives its
/// own clone of the inner service.
#[derive(Clone)]
pub struct BoxedTransport {
    service: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for BoxedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedTransport").finish_non_exhaustive()
    }
}

impl BoxedTransport {
    /// Box a transport.
    pub fn new<T: Transport>(transport: T) -> Self {
        Self { service: Arc::new(Mutex::new(BoxCloneService::new(transport))) }
    }

    /// Issue one physical request once the transport reports ready.
    pub fn call(
        &self,
        request: TransportRequest,
    ) -> impl std::future::Future<Output = Result<Bytes, TomahawkError>> + Send + 'static {
        let svc = self.service.lock().clone();
        svc.oneshot(request)
    }
}
