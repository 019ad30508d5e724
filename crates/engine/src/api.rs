//! HTTP API for health checks, Prometheus metrics, and zone decisions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use engine_lib::{
    health::{ComponentStatus, HealthRegistry},
    models::RealizedOutcome,
    observability::EngineMetrics,
    OptimizationEngine,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
    pub engine: Arc<OptimizationEngine>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: EngineMetrics,
        engine: Arc<OptimizationEngine>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            engine,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Latest optimization decision for a zone
async fn zone_decision(
    State(state): State<Arc<AppState>>,
    Path(zone_id): Path<String>,
) -> impl IntoResponse {
    match state.engine.last_decision(&zone_id) {
        Some(decision) => (StatusCode::OK, Json(decision)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no decision for zone", "zone_id": zone_id })),
        )
            .into_response(),
    }
}

/// Report a realized outcome for a zone; feeds the learning loop
async fn zone_outcome(
    State(state): State<Arc<AppState>>,
    Path(zone_id): Path<String>,
    Json(outcome): Json<RealizedOutcome>,
) -> impl IntoResponse {
    state.engine.update_models(&zone_id, &outcome);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "zone_id": zone_id,
            "buffered_samples": state.engine.buffered_samples(&zone_id),
        })),
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/zones/:zone_id/decision", get(zone_decision))
        .route("/zones/:zone_id/outcomes", post(zone_outcome))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
