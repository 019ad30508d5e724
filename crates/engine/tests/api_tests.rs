//! Integration tests for the engine API endpoints

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use engine_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    models::{
        EnvironmentalFactors, GrowthStage, OptimizationConstraints, RealizedOutcome, ZoneState,
    },
    observability::EngineMetrics,
    tuning::EngineConfig,
    OptimizationEngine,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
    pub engine: Arc<OptimizationEngine>,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

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

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/zones/:zone_id/decision", get(zone_decision))
        .route("/zones/:zone_id/outcomes", post(zone_outcome))
        .with_state(state)
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::PID_BANK).await;
    health_registry.register(components::PREDICTOR).await;

    let metrics = EngineMetrics::new();
    let engine = Arc::new(OptimizationEngine::new(
        EngineConfig::default(),
        "test-facility",
    ));
    let state = Arc::new(AppState {
        health_registry,
        metrics,
        engine,
    });
    let router = create_test_router(state.clone());

    (router, state)
}

fn test_zone_inputs() -> (ZoneState, EnvironmentalFactors, OptimizationConstraints) {
    (
        ZoneState {
            intensity: 60.0,
            photoperiod: 16.0,
            baseline_power: 50_000.0,
            electricity_rate: 0.12,
            growth_stage: GrowthStage::Vegetative,
            crop_type: "lettuce".to_string(),
            current_demand: 300.0,
            max_demand: 500.0,
        },
        EnvironmentalFactors {
            temperature: 22.0,
            humidity: 60.0,
            co2_level: 900.0,
            vpd: 1.0,
            solar_radiation: 200.0,
            cloud_cover: 0.2,
        },
        OptimizationConstraints {
            target_dli: 17.0,
            min_intensity: None,
        },
    )
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["pid_bank"].is_object());
    assert!(health["components"]["predictor"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::PREDICTOR, "Running on fallback predictions")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::PID_BANK, "Tuning table failed to load")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.observe_optimization_latency(0.001);
    state.metrics.set_zones_tracked(3);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("lighting_engine_optimization_latency_seconds"));
    assert!(metrics_text.contains("lighting_engine_zones_tracked"));
}

#[tokio::test]
async fn test_zone_decision_404_before_first_tick() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/zones/veg-1/decision")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zone_decision_returns_latest() {
    let (app, state) = setup_test_app().await;

    let (zone, env, constraints) = test_zone_inputs();
    state.engine.optimize_zone("veg-1", &zone, &env, &constraints);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/zones/veg-1/decision")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let decision: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(decision["zone_id"], "veg-1");
    let intensity = decision["intensity"].as_u64().unwrap();
    assert!((50..=100).contains(&intensity));
    assert!(decision["reasoning"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn test_zone_outcome_is_buffered() {
    let (app, state) = setup_test_app().await;

    let outcome = serde_json::json!({
        "intensity": 72.0,
        "photoperiod": 16.0,
        "temperature": 22.5,
        "humidity": 58.0,
        "co2_level": 850.0,
        "solar_radiation": 210.0,
        "observed_dli": 16.8,
        "timestamp": 1_750_000_000
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/zones/veg-1/outcomes")
                .header("content-type", "application/json")
                .body(Body::from(outcome.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let reply: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(reply["buffered_samples"], 1);
    assert_eq!(state.engine.buffered_samples("veg-1"), 1);
}
