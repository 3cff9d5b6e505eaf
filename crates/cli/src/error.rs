//! HTTP mapping of router errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use derive_more::{Display, From};
use tomahawk_types::TomahawkError;

/// A router error on its way back to an HTTP caller.
#[derive(Debug, Display, From)]
pub struct ApiError(TomahawkError);

impl ApiError {
    /// Status code reported to the caller.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }

    /// The wrapped error.
    #[must_use]
    pub const fn inner(&self) -> &TomahawkError {
        &self.0
    }
}

fn status_for(error: &TomahawkError) -> StatusCode {
    match error {
        TomahawkError::NotFound { .. } => StatusCode::NOT_FOUND,
        TomahawkError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        TomahawkError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        TomahawkError::Decode(_) | TomahawkError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        TomahawkError::AllHostsExhausted { last } => match **last {
            TomahawkError::NotFound { .. } => StatusCode::NOT_FOUND,
            TomahawkError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        },
        TomahawkError::ConnectionRefused { .. }
        | TomahawkError::Connection { .. }
        | TomahawkError::Upstream { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            debug!(error = %self.0, kind = self.0.kind(), "Esplora request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}
