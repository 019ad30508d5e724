//! Observability infrastructure for the lighting engine
//!
//! Provides:
//! - Prometheus metrics (optimization latency, retrain latency, fallback usage, model version)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, GaugeVec, Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct EngineMetricsInner {
    optimization_latency_seconds: Histogram,
    retrain_latency_seconds: Histogram,
    model_version_info: GaugeVec,
    zones_tracked: IntGauge,
    decisions_generated: IntGauge,
    fallback_predictions: IntGauge,
    buffered_samples: IntGauge,
    retrains_completed: IntGauge,
    retrain_failures: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            optimization_latency_seconds: register_histogram!(
                "lighting_engine_optimization_latency_seconds",
                "Time spent computing one zone optimization decision",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register optimization_latency_seconds"),

            retrain_latency_seconds: register_histogram!(
                "lighting_engine_retrain_latency_seconds",
                "Time spent retraining the DLI predictor",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register retrain_latency_seconds"),

            model_version_info: register_gauge_vec!(
                "lighting_engine_model_version_info",
                "Version of the currently active model per role",
                &["role", "version"]
            )
            .expect("Failed to register model_version_info"),

            zones_tracked: register_int_gauge!(
                "lighting_engine_zones_tracked",
                "Number of zones with optimization state"
            )
            .expect("Failed to register zones_tracked"),

            decisions_generated: register_int_gauge!(
                "lighting_engine_decisions_generated_total",
                "Total number of optimization decisions generated"
            )
            .expect("Failed to register decisions_generated"),

            fallback_predictions: register_int_gauge!(
                "lighting_engine_fallback_predictions_total",
                "Total number of predictions served by rule-based fallbacks"
            )
            .expect("Failed to register fallback_predictions"),

            buffered_samples: register_int_gauge!(
                "lighting_engine_buffered_samples",
                "Training samples currently buffered across all zones"
            )
            .expect("Failed to register buffered_samples"),

            retrains_completed: register_int_gauge!(
                "lighting_engine_retrains_completed_total",
                "Total number of successful model retrains"
            )
            .expect("Failed to register retrains_completed"),

            retrain_failures: register_int_gauge!(
                "lighting_engine_retrain_failures_total",
                "Total number of rejected or failed retrains"
            )
            .expect("Failed to register retrain_failures"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record an optimization latency observation
    pub fn observe_optimization_latency(&self, duration_secs: f64) {
        self.inner().optimization_latency_seconds.observe(duration_secs);
    }

    /// Record a retrain latency observation
    pub fn observe_retrain_latency(&self, duration_secs: f64) {
        self.inner().retrain_latency_seconds.observe(duration_secs);
    }

    /// Update the active model version for one role
    pub fn set_model_version(&self, role: &str, version: u64) {
        self.inner()
            .model_version_info
            .with_label_values(&[role, &version.to_string()])
            .set(1.0);
    }

    /// Update zones tracked count
    pub fn set_zones_tracked(&self, count: i64) {
        self.inner().zones_tracked.set(count);
    }

    /// Update buffered sample count across all zones
    pub fn set_buffered_samples(&self, count: i64) {
        self.inner().buffered_samples.set(count);
    }

    /// Increment decisions generated counter
    pub fn inc_decisions_generated(&self) {
        self.inner().decisions_generated.inc();
    }

    /// Increment fallback predictions counter
    pub fn inc_fallback_predictions(&self) {
        self.inner().fallback_predictions.inc();
    }

    /// Increment successful retrain counter
    pub fn inc_retrains_completed(&self) {
        self.inner().retrains_completed.inc();
    }

    /// Increment retrain failure counter
    pub fn inc_retrain_failures(&self) {
        self.inner().retrain_failures.inc();
    }
}

/// Structured logger for engine events
///
/// Provides consistent JSON-formatted logging for decisions, retrains,
/// and other significant events.
#[derive(Clone)]
pub struct StructuredLogger {
    facility: String,
}

impl StructuredLogger {
    pub fn new(facility: impl Into<String>) -> Self {
        Self {
            facility: facility.into(),
        }
    }

    /// Log an optimization decision
    pub fn log_decision(
        &self,
        zone_id: &str,
        intensity: u32,
        confidence: f32,
        estimated_savings: f32,
        used_fallback: bool,
    ) {
        info!(
            event = "decision_generated",
            facility = %self.facility,
            zone_id = %zone_id,
            intensity = intensity,
            confidence = confidence,
            estimated_savings = estimated_savings,
            used_fallback = used_fallback,
            "Generated optimization decision"
        );
    }

    /// Log a retrain trigger for one zone
    pub fn log_retrain_triggered(&self, zone_id: &str, batch_size: usize) {
        info!(
            event = "retrain_triggered",
            facility = %self.facility,
            zone_id = %zone_id,
            batch_size = batch_size,
            "Sample buffer full, retrain queued"
        );
    }

    /// Log a fallback prediction
    pub fn log_fallback(&self, zone_id: &str, role: &str) {
        info!(
            event = "fallback_prediction",
            facility = %self.facility,
            zone_id = %zone_id,
            role = %role,
            "Served rule-based fallback prediction"
        );
    }

    /// Log a rejected optimization request
    pub fn log_invalid_constraints(&self, zone_id: &str, details: &str) {
        warn!(
            event = "invalid_constraints",
            facility = %self.facility,
            zone_id = %zone_id,
            details = %details,
            "Holding current intensity on invalid constraints"
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str, zones: usize) {
        info!(
            event = "engine_started",
            facility = %self.facility,
            engine_version = %version,
            zones = zones,
            "Lighting engine started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            facility = %self.facility,
            reason = %reason,
            "Lighting engine shutting down"
        );
    }
}
