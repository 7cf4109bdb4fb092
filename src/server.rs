//! HTTP endpoint serving the exposition.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info};

use crate::exporter::MetricsExporter;
use crate::shutdown::ShutdownSignal;

/// Builds the router for `/metrics` and `/healthz`.
pub fn router(exporter: Arc<MetricsExporter>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .with_state(exporter)
}

async fn metrics(State(exporter): State<Arc<MetricsExporter>>) -> Response {
    match exporter.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics\n").into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serves until `shutdown` fires.
///
/// # Errors
///
/// Returns the I/O error that stopped the listener.
pub async fn serve(
    listener: TcpListener,
    exporter: Arc<MetricsExporter>,
    shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Serving metrics on /metrics");
    }
    axum::serve(listener, router(exporter))
        .with_graceful_shutdown(shutdown.wait())
        .await
}
