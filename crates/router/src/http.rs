//! HTTP transport for Esplora hosts.
//!
//! URL hosts go through a keep-alive `reqwest` client. Socket hosts are
//! dialed over a UNIX domain socket with a plain hyper HTTP/1 connection.

use std::{
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use futures::future::BoxFuture;
use tomahawk_types::{EsploraRequest, HostAddress, Method, TomahawkError, TransportRequest};
use tower::Service;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// How long an idle pooled connection is kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            user_agent: concat!("tomahawk/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP transport performing one physical request per call.
///
/// Timeouts, retries and host selection are the dispatcher's job.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TomahawkError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TomahawkError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, user_agent: config.user_agent })
    }

    async fn send_url(
        client: reqwest::Client,
        address: HostAddress,
        request: EsploraRequest,
    ) -> Result<Bytes, TomahawkError> {
        let base = address.to_string();
        let url = address.resolve(&request.path);
        let mut builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
        };
        builder = builder.header(reqwest::header::ACCEPT, request.kind.accept());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body {
            builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json").body(body);
        }

        let response = builder.send().await.map_err(|e| classify_reqwest(&base, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(&base, &request.path, status.as_u16()));
        }

        response.bytes().await.map_err(|e| classify_reqwest(&base, &e))
    }

    #[cfg(unix)]
    async fn send_socket(
        path: std::path::PathBuf,
        user_agent: String,
        request: EsploraRequest,
    ) -> Result<Bytes, TomahawkError> {
        use http_body_util::{BodyExt, Full};
        use hyper::header;
        use hyper_util::rt::TokioIo;

        let host = HostAddress::Socket(path.clone()).to_string();

        let stream = tokio::net::UnixStream::connect(&path).await.map_err(|e| io_error(&host, &e))?;
        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream))
                .await
                .map_err(|e| TomahawkError::Connection { host: host.clone(), reason: e.to_string() })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "unix socket connection closed");
            }
        });

        let method = match request.method {
            Method::Get => hyper::Method::GET,
            Method::Post => hyper::Method::POST,
        };
        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(socket_uri(&request)?)
            .header(header::HOST, "localhost")
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, request.kind.accept());
        if request.body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(Full::new(request.body.unwrap_or_default()))
            .map_err(|e| TomahawkError::Internal(format!("invalid request: {e}")))?;

        let response = sender
            .send_request(req)
            .await
            .map_err(|e| TomahawkError::Connection { host: host.clone(), reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(&host, &request.path, status.as_u16()));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TomahawkError::Connection { host: host.clone(), reason: e.to_string() })?;
        Ok(body.to_bytes())
    }

    #[cfg(not(unix))]
    async fn send_socket(
        path: std::path::PathBuf,
        _user_agent: String,
        _request: EsploraRequest,
    ) -> Result<Bytes, TomahawkError> {
        Err(TomahawkError::Internal(format!(
            "unix sockets are not supported on this platform: {}",
            path.display()
        )))
    }
}

impl Service<TransportRequest> for HttpTransport {
    type Response = Bytes;
    type Error = TomahawkError;
    type Future = BoxFuture<'static, Result<Bytes, TomahawkError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: TransportRequest) -> Self::Future {
        let TransportRequest { address, request } = request;
        match address {
            HostAddress::Socket(path) => {
                Box::pin(Self::send_socket(path, self.user_agent.clone(), request))
            }
            url @ HostAddress::Url(_) => Box::pin(Self::send_url(self.client.clone(), url, request)),
        }
    }
}

/// Path and query of a socket request.
#[cfg_attr(not(unix), allow(dead_code))]
fn socket_uri(request: &EsploraRequest) -> Result<String, TomahawkError> {
    if request.query.is_empty() {
        return Ok(request.path.clone());
    }
    let mut url = reqwest::Url::parse("http://localhost")
        .map_err(|e| TomahawkError::Internal(e.to_string()))?;
    url.set_path(&request.path);
    url.query_pairs_mut().extend_pairs(request.query.iter());
    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

fn status_error(host: &str, path: &str, status: u16) -> TomahawkError {
    if status == 404 {
        TomahawkError::NotFound { path: path.to_string() }
    } else {
        TomahawkError::Upstream { host: host.to_string(), status }
    }
}

#[cfg_attr(not(unix), allow(dead_code))]
fn io_error(host: &str, error: &std::io::Error) -> TomahawkError {
    match error.kind() {
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
            TomahawkError::ConnectionRefused { host: host.to_string() }
        }
        std::io::ErrorKind::TimedOut => TomahawkError::Timeout { host: host.to_string() },
        _ => TomahawkError::Connection { host: host.to_string(), reason: error.to_string() },
    }
}

fn classify_reqwest(host: &str, error: &reqwest::Error) -> TomahawkError {
    if error.is_timeout() {
        return TomahawkError::Timeout { host: host.to_string() };
    }

    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::ConnectionRefused
        {
            return TomahawkError::ConnectionRefused { host: host.to_string() };
        }
        source = err.source();
    }

    TomahawkError::Connection { host: host.to_string(), reason: error.to_string() }
}
