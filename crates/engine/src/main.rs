//! Lighting Engine - adaptive lighting optimization service
//!
//! Runs the per-zone optimization loop for a horticultural facility,
//! exposing health, metrics, and decision endpoints over HTTP.

use anyhow::Result;
use engine_lib::{
    health::{components, HealthRegistry},
    learning::{TrainerWorker, TrainingConfig},
    observability::{EngineMetrics, StructuredLogger},
    predictor::{ModelRole, ModelStore},
    scheduler::{OptimizationLoop, TickConfig},
    tuning::EngineConfig,
    OptimizationEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod zones;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

const MODEL_ROLES: [ModelRole; 3] = [
    ModelRole::DliPredictor,
    ModelRole::DemandPredictor,
    ModelRole::SavingsEstimator,
];

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting lighting-engine");

    // Load configuration
    let service_config = config::ServiceConfig::load()?;
    info!(facility = %service_config.facility_name, "Engine configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::PID_BANK).await;
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::TRAINER).await;
    health_registry.register(components::SCHEDULER).await;

    // Initialize metrics and structured logging
    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(&service_config.facility_name);

    // Build the engine core
    let engine_config = EngineConfig::default();
    let engine = OptimizationEngine::new(engine_config, &service_config.facility_name);

    // Open the model store and warm-start from persisted artifacts
    let store = match ModelStore::new(&service_config.model_dir) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!(dir = %service_config.model_dir, error = %e, "Model store unavailable");
            health_registry
                .set_degraded(components::PREDICTOR, "Model store unavailable")
                .await;
            None
        }
    };
    if let Some(store) = &store {
        for role in MODEL_ROLES {
            match store.load(role) {
                Ok(Some(model)) => {
                    metrics.set_model_version(role.artifact_name(), u64::from(model.version));
                    engine.registry().install(role, model);
                }
                Ok(None) => {
                    debug!(role = role.artifact_name(), "No persisted model, using fallback");
                }
                Err(e) => {
                    warn!(role = role.artifact_name(), error = %e, "Failed to load model artifact");
                    health_registry
                        .set_degraded(components::PREDICTOR, "Corrupt model artifact on disk")
                        .await;
                }
            }
        }
    }

    // Wire the background trainer
    let (worker, retrain_tx) = TrainerWorker::new(
        engine.registry().clone(),
        store,
        TrainingConfig::default(),
    );
    let engine = Arc::new(engine.with_trainer(retrain_tx));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let trainer_handle = tokio::spawn(worker.run(shutdown_tx.subscribe()));

    // Start the optimization loop when a zones file is configured
    if let Some(zones_file) = &service_config.zones_file {
        let provider = Arc::new(zones::FileZoneProvider::new(zones_file));
        let tick_config = TickConfig {
            interval: Duration::from_secs(service_config.tick_interval_secs),
            ..TickConfig::default()
        };
        let (optimization_loop, mut decision_rx) =
            OptimizationLoop::new(engine.clone(), provider, tick_config);
        let optimization_loop = optimization_loop.with_health(health_registry.clone());
        tokio::spawn(optimization_loop.run(shutdown_tx.subscribe()));

        // Drain decisions; callers poll the API for the latest per zone
        tokio::spawn(async move {
            while let Some(decision) = decision_rx.recv().await {
                debug!(
                    zone_id = %decision.zone_id,
                    intensity = decision.intensity,
                    confidence = decision.confidence,
                    "Decision emitted"
                );
            }
        });
    } else {
        info!("No zones file configured, decisions served on demand only");
    }

    logger.log_startup(ENGINE_VERSION, engine.zones_tracked());

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        engine.clone(),
    ));

    // Mark engine as ready after initialization
    health_registry.set_ready(true).await;

    // Start health and metrics server
    tokio::spawn(api::serve(service_config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    let _ = trainer_handle.await;
    info!("Shutting down");

    Ok(())
}
