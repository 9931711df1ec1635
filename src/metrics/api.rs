//! HTTP endpoints
//!
//! - `GET /metrics` : usage gauges, then exporter self-metrics
//! - `GET /healthz` : liveness
//! - `GET /`        : endpoint index

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use super::gauges::GaugeSet;
use super::render::{render_snapshot, CONTENT_TYPE};

/// State shared by the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    gauges: Arc<GaugeSet>,
    self_metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(gauges: Arc<GaugeSet>, self_metrics: Option<PrometheusHandle>) -> Self {
        Self { gauges, self_metrics }
    }
}

/// Build the exporter router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Metrics endpoint listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> impl IntoResponse {
    (
        StatusCode::OK,
        "SORMAS usage exporter\n\n/metrics  usage gauges\n/healthz  liveness\n",
    )
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.gauges.snapshot();
    let mut body = render_snapshot(&snapshot);
    if let Some(handle) = &state.self_metrics {
        body.push_str(&handle.render());
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}
