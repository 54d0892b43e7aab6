//! API Routes
//!
//! HTTP endpoints for the node snapshot, engine status and metrics

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::api::Metrics;
use crate::config::MapperConfig;
use crate::registry::RegistryFile;
use crate::status::StatusReporter;

/// Shared API state
pub struct ApiState {
    pub config: Arc<MapperConfig>,
    pub store: Arc<RegistryFile>,
    pub status: Arc<StatusReporter>,
    pub metrics: Arc<Metrics>,
}

/// Build the read API router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))

        // Snapshot
        .route("/nodes", get(get_nodes))
        .route("/status", get(get_status))

        // Metrics
        .route("/metrics", get(get_metrics_prometheus))
        .route("/metrics/json", get(get_metrics_json))

        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_api_server(state: Arc<ApiState>) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.config.api_port));
    let app = router(state);

    info!("📊 HTTP API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /
async fn index() -> impl IntoResponse {
    "Hello"
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /nodes - Registry snapshot
async fn get_nodes(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let nodes: Vec<serde_json::Value> = match state.store.load().await {
        Ok(registry) => registry
            .records()
            .filter_map(|record| serde_json::to_value(record).ok())
            .collect(),
        Err(e) => {
            warn!("Serving empty node list: {}", e);
            Vec::new()
        }
    };

    Json(serde_json::json!({
        "network": state.config.network,
        "nodes": nodes,
    }))
}

/// GET /status - Engine status
async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.status.read().await)
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
}

/// GET /metrics/json - JSON format metrics
async fn get_metrics_json(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}
