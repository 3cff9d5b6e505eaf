//! Listener lifecycle for the passthrough and metrics servers.

use std::sync::Arc;

use axum::{Router, routing::get};
use eyre::{Context, Result};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tomahawk_config::TomahawkConfig;

use crate::{TomahawkMetrics, metrics_handler};

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut term, mut int) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Signal handlers unavailable, waiting for ctrl-c");
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };

    let name = tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
    };
    info!(signal = name, "Stopping tomahawk");
}

/// Resolves on ctrl-c.
#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!(signal = "ctrl-c", "Stopping tomahawk");
}

async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr).await.wrap_err_with(|| format!("failed to bind to {addr}"))
}

/// Serve `/metrics` on its own listener until `stop` fires.
fn spawn_metrics(
    listener: TcpListener,
    mut stop: broadcast::Receiver<()>,
) -> Result<JoinHandle<()>> {
    let metrics =
        Arc::new(TomahawkMetrics::new().wrap_err("failed to initialize metrics recorder")?);
    let app = Router::new().route("/metrics", get(metrics_handler)).with_state(metrics);

    Ok(tokio::spawn(async move {
        let stopped = async move {
            stop.recv().await.ok();
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stopped).await {
            warn!(error = %e, "Metrics server failed");
        }
    }))
}

/// Serve `app` until SIGINT or SIGTERM, alongside the metrics listener when
/// `[metrics]` is enabled.
///
/// # Errors
///
/// Returns an error if a listener cannot be bound or the server fails.
pub async fn run_server(app: Router, config: &TomahawkConfig) -> Result<()> {
    let listener = bind(&config.server.host, config.server.port).await?;
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Tomahawk listening");
    }

    let (stop_tx, _) = broadcast::channel::<()>(1);

    let metrics = if config.metrics.enabled {
        let listener = bind(&config.metrics.host, config.metrics.port).await?;
        if let Ok(addr) = listener.local_addr() {
            info!(address = %addr, "Serving metrics");
        }
        Some(spawn_metrics(listener, stop_tx.subscribe())?)
    } else {
        None
    };

    let stop = {
        let stop_tx = stop_tx.clone();
        async move {
            shutdown_signal().await;
            stop_tx.send(()).ok();
        }
    };
    axum::serve(listener, app).with_graceful_shutdown(stop).await.wrap_err("server error")?;

    if let Some(handle) = metrics {
        handle.await.ok();
    }
    info!("Tomahawk stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_taken_port_names_address() {
        let taken = bind("127.0.0.1", 0).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind("127.0.0.1", port).await.unwrap_err();
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}
