//! HTTP passthrough in front of the failover router.
//!
//! `/api/{*path}` forwards to whichever Esplora host is active; `/hosts`
//! shows the current ranking.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tomahawk_client::EsploraClient;
use tomahawk_router::{Host, Rankable};
use tomahawk_types::{EsploraRequest, ResponseKind};

use crate::ApiError;

/// Shared state of the passthrough server.
#[derive(Debug, Clone)]
pub struct AppState {
    client: EsploraClient,
}

impl AppState {
    /// Wrap a client.
    #[must_use]
    pub const fn new(client: EsploraClient) -> Self {
        Self { client }
    }

    /// The Esplora client.
    #[must_use]
    pub const fn client(&self) -> &EsploraClient {
        &self.client
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/hosts", get(hosts))
        .route("/api/{*path}", get(forward_get).post(forward_post))
        .with_state(state)
}

/// Health check endpoint.
///
/// Returns 200 OK if the server is up, regardless of upstream health.
#[tracing::instrument]
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// One row of the `/hosts` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostView {
    /// Host address.
    pub address: String,
    /// Whether requests currently go to this host.
    pub active: bool,
    /// Whether this is the configured primary.
    pub preferred: bool,
    /// Mean round-trip time, absent until the first successful probe.
    pub rtt_ms: Option<f64>,
    /// Last observed tip height.
    pub latest_height: Option<u64>,
    /// Consecutive live-request failures.
    pub failure_count: u32,
    /// Whether the host lags the tip.
    pub out_of_sync: bool,
    /// Whether the last probe or live request could not connect.
    pub unreachable: bool,
}

impl HostView {
    fn new(host: &Host, active: bool) -> Self {
        let rtt = host.rtt();
        Self {
            address: host.address().to_string(),
            active,
            preferred: host.is_preferred(),
            rtt_ms: rtt.is_finite().then_some(rtt),
            latest_height: host.latest_height(),
            failure_count: host.failure_count(),
            out_of_sync: host.is_out_of_sync(),
            unreachable: host.is_unreachable(),
        }
    }
}

/// Hosts in ranked order, best first.
pub async fn hosts(State(state): State<Arc<AppState>>) -> Json<Vec<HostView>> {
    let snapshot = state.client.router().registry().snapshot();
    let rows =
        snapshot.hosts().iter().map(|host| HostView::new(host, snapshot.is_active(host))).collect();
    Json(rows)
}

async fn forward_get(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let kind = response_kind(&path);
    let mut request = EsploraRequest::get(format!("/{path}"), kind);
    request.query = query;

    let body = state.client.router().execute(&request).await?;
    Ok(passthrough(kind, body))
}

async fn forward_post(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = state.client.router().post(format!("/{path}"), body).await?;
    Ok(passthrough(ResponseKind::Json, body))
}

/// Raw endpoints (`/block/:hash/raw`, `/tx/:txid/raw`) return binary.
fn response_kind(path: &str) -> ResponseKind {
    if path.trim_end_matches('/').ends_with("/raw") { ResponseKind::Bytes } else { ResponseKind::Json }
}

fn passthrough(kind: ResponseKind, body: Bytes) -> Response {
    ([(CONTENT_TYPE, content_type(kind, &body))], body).into_response()
}

/// Best guess at the upstream content type, which the router does not keep.
fn content_type(kind: ResponseKind, body: &[u8]) -> &'static str {
    match kind {
        ResponseKind::Bytes => "application/octet-stream",
        ResponseKind::Json => match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{' | b'[') => "application/json",
            _ => "text/plain",
        },
    }
}
