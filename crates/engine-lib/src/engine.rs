//! Per-zone optimization pipeline
//!
//! Each call runs the full decision chain for one zone: predict DLI,
//! run the zone's PID controller, ask for a demand-response reduction,
//! apply crop-specific environmental compensation, fuse the signals
//! under configured weights, then attach a confidence score, savings
//! estimate, and an ordered reasoning trace.

use crate::compensation::temperature_compensation;
use crate::learning::{RetrainRequest, SampleBuffer};
use crate::models::{
    EnvironmentalFactors, OptimizationConstraints, OptimizationDecision, RealizedOutcome,
    TrainingSample, ZoneState,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::pid::{PidBank, DEFAULT_OUTPUT_MIN};
use crate::predictor::features::{
    demand_features, dli_features, outcome_features, savings_features,
};
use crate::predictor::{ModelRegistry, Prediction};
use crate::tuning::EngineConfig;
use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

/// Sample count treated as "enough data" when scoring confidence.
/// Deliberately independent of the retrain threshold: a deployment that
/// retrains late should not report inflated confidence early.
const DATA_SUFFICIENCY_SAMPLES: usize = 100;

/// Confidence penalty when air temperature is outside the range where
/// the predictors were calibrated
const CALIBRATED_TEMP_RANGE: (f32, f32) = (15.0, 35.0);

/// The optimization engine: one instance serves every zone
pub struct OptimizationEngine {
    config: EngineConfig,
    pid_bank: PidBank,
    registry: Arc<ModelRegistry>,
    buffers: DashMap<String, Mutex<SampleBuffer>>,
    last_decisions: DashMap<String, OptimizationDecision>,
    retrain_tx: Option<mpsc::Sender<RetrainRequest>>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl OptimizationEngine {
    pub fn new(config: EngineConfig, facility: impl Into<String>) -> Self {
        let registry = Arc::new(ModelRegistry::new((
            config.peak_window_start,
            config.peak_window_end,
        )));
        let pid_bank = PidBank::new(config.tuning.clone());
        Self {
            config,
            pid_bank,
            registry,
            buffers: DashMap::new(),
            last_decisions: DashMap::new(),
            retrain_tx: None,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new(facility),
        }
    }

    /// Wire the retrain channel; without it, full buffers are truncated
    /// but no retrain runs
    pub fn with_trainer(mut self, tx: mpsc::Sender<RetrainRequest>) -> Self {
        self.retrain_tx = Some(tx);
        self
    }

    /// Shared model registry, for the trainer and artifact loading
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Run one optimization tick for a zone at the current time
    pub fn optimize_zone(
        &self,
        zone_id: &str,
        state: &ZoneState,
        env: &EnvironmentalFactors,
        constraints: &OptimizationConstraints,
    ) -> OptimizationDecision {
        self.optimize_zone_at(zone_id, state, env, constraints, Utc::now())
    }

    /// Run one optimization tick for a zone at an explicit time
    pub fn optimize_zone_at(
        &self,
        zone_id: &str,
        state: &ZoneState,
        env: &EnvironmentalFactors,
        constraints: &OptimizationConstraints,
        when: DateTime<Utc>,
    ) -> OptimizationDecision {
        let start = Instant::now();

        if !constraints.target_dli.is_finite() || constraints.target_dli <= 0.0 {
            self.logger.log_invalid_constraints(
                zone_id,
                &format!("target_dli {} is not a positive number", constraints.target_dli),
            );
            let decision = OptimizationDecision {
                zone_id: zone_id.to_string(),
                intensity: state.intensity.clamp(0.0, 100.0).round() as u32,
                confidence: 0.0,
                estimated_savings: 0.0,
                reasoning: vec!["Invalid target DLI, holding current intensity".to_string()],
                generated_at: when.timestamp(),
            };
            self.last_decisions.insert(zone_id.to_string(), decision.clone());
            return decision;
        }

        let mut reasoning = Vec::with_capacity(6);
        let mut used_fallback = false;

        // 1. Predicted DLI under current settings
        let dli_feats = dli_features(state, env, when);
        let predicted = self.registry.predict_dli(&dli_feats, state);
        self.note_fallback(zone_id, "dli_predictor", &predicted, &mut used_fallback);
        reasoning.push(format!(
            "Predicted DLI {:.2} mol/m2/day vs target {:.2} ({})",
            predicted.value,
            constraints.target_dli,
            source_label(&predicted)
        ));

        // 2. PID correction toward the target
        let pid_output = self.pid_bank.run(
            zone_id,
            &state.crop_type,
            state.growth_stage,
            predicted.value,
            constraints.target_dli,
        );
        reasoning.push(format!("PID control output {pid_output:.1}%"));

        // 3. Demand-response reduction
        let demand_feats = demand_features(state, env, when);
        let reduction = self
            .registry
            .predict_demand_reduction(&demand_feats, when.hour());
        self.note_fallback(zone_id, "demand_predictor", &reduction, &mut used_fallback);
        reasoning.push(format!(
            "Demand response reduction {:.1}% ({})",
            reduction.value,
            source_label(&reduction)
        ));

        // 4. Crop environmental compensation
        let band = self.config.tuning.temperature_band(&state.crop_type);
        let compensation = temperature_compensation(env.temperature, env.vpd, &band);
        reasoning.push(format!(
            "Environmental compensation {compensation:.1}% for {}",
            state.crop_type
        ));

        // 5. Weighted fusion of the four signals
        let weights = &self.config.fusion;
        let mut fused = pid_output * weights.pid
            + (100.0 - reduction.value) * weights.demand
            + compensation * weights.environment
            + weights.floor_value * weights.floor;

        // 6. Optional crop-model blend
        if let Some(crop_suggestion) = self.registry.crop_adjustment(&state.crop_type, &dli_feats)
        {
            fused = fused * (1.0 - weights.crop_blend) + crop_suggestion * weights.crop_blend;
            reasoning.push(format!(
                "Crop model suggested {crop_suggestion:.1}%, blended at {:.0}%",
                weights.crop_blend * 100.0
            ));
        }

        // 7. Constraint clamp
        let floor = constraints
            .min_intensity
            .filter(|m| m.is_finite())
            .unwrap_or(DEFAULT_OUTPUT_MIN)
            .clamp(0.0, 100.0);
        let clamped = fused.clamp(floor, 100.0);
        let intensity = clamped.round() as u32;
        reasoning.push(format!("Fused intensity {fused:.1}%, applying {intensity}%"));

        // 8. Savings estimate for the resulting setting
        let power_saved_kw = state.baseline_power * (100.0 - clamped) / 100.0 / 1000.0;
        let energy_saved_kwh = (power_saved_kw * state.photoperiod).max(0.0);
        let savings_feats = savings_features(energy_saved_kwh, state.electricity_rate, env, when);
        let savings =
            self.registry
                .estimate_savings(&savings_feats, energy_saved_kwh, state.electricity_rate);
        self.note_fallback(zone_id, "savings_estimator", &savings, &mut used_fallback);

        // 9. Confidence score
        let confidence = self.confidence_score(
            zone_id,
            predicted.value,
            constraints.target_dli,
            env.temperature,
        );

        let decision = OptimizationDecision {
            zone_id: zone_id.to_string(),
            intensity,
            confidence,
            estimated_savings: savings.value.max(0.0),
            reasoning,
            generated_at: when.timestamp(),
        };

        self.metrics
            .observe_optimization_latency(start.elapsed().as_secs_f64());
        self.metrics.inc_decisions_generated();
        self.metrics.set_zones_tracked(self.pid_bank.len() as i64);
        self.logger.log_decision(
            zone_id,
            decision.intensity,
            decision.confidence,
            decision.estimated_savings,
            used_fallback,
        );
        self.last_decisions.insert(zone_id.to_string(), decision.clone());
        decision
    }

    /// Report one realized outcome for a zone. Buffers the sample and
    /// queues a retrain when the zone's buffer fills.
    pub fn update_models(&self, zone_id: &str, outcome: &RealizedOutcome) {
        let sample = TrainingSample {
            features: outcome_features(outcome),
            observed_dli: outcome.observed_dli,
            recorded_at: outcome.timestamp,
        };

        let batch = {
            let entry = self.buffers.entry(zone_id.to_string()).or_insert_with(|| {
                Mutex::new(SampleBuffer::new(
                    self.config.retrain_threshold,
                    self.config.retain_after_retrain,
                ))
            });
            // Drop the guard before the map entry it borrows
            let triggered = entry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(sample);
            triggered
        };

        if let Some(batch) = batch {
            self.logger.log_retrain_triggered(zone_id, batch.len());
            if let Some(tx) = &self.retrain_tx {
                let request = RetrainRequest {
                    zone_id: zone_id.to_string(),
                    samples: batch,
                };
                if let Err(e) = tx.try_send(request) {
                    warn!(zone_id, error = %e, "Retrain queue full, dropping batch");
                }
            }
        }

        self.metrics.set_buffered_samples(self.total_buffered() as i64);
    }

    fn confidence_score(
        &self,
        zone_id: &str,
        predicted_dli: f32,
        target_dli: f32,
        temperature: f32,
    ) -> f32 {
        let mut confidence = 100.0 - 50.0 * ((predicted_dli - target_dli).abs() / target_dli);

        let (low, high) = CALIBRATED_TEMP_RANGE;
        if !(low..=high).contains(&temperature) {
            confidence -= 10.0;
        }

        let buffered = self.buffered_samples(zone_id);
        if buffered < DATA_SUFFICIENCY_SAMPLES {
            confidence *= buffered as f32 / DATA_SUFFICIENCY_SAMPLES as f32;
        }

        if !self.registry.dli_trained() {
            confidence *= 0.7;
        }

        confidence.clamp(0.0, 100.0)
    }

    fn note_fallback(
        &self,
        zone_id: &str,
        role: &str,
        prediction: &Prediction,
        used_fallback: &mut bool,
    ) {
        if prediction.is_fallback() {
            *used_fallback = true;
            self.metrics.inc_fallback_predictions();
            self.logger.log_fallback(zone_id, role);
        }
    }

    /// Most recent decision for a zone, if any
    pub fn last_decision(&self, zone_id: &str) -> Option<OptimizationDecision> {
        self.last_decisions.get(zone_id).map(|d| d.clone())
    }

    /// Samples currently buffered for a zone
    pub fn buffered_samples(&self, zone_id: &str) -> usize {
        self.buffers
            .get(zone_id)
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    fn total_buffered(&self) -> usize {
        self.buffers
            .iter()
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Number of zones with live controller state
    pub fn zones_tracked(&self) -> usize {
        self.pid_bank.len()
    }
}

fn source_label(prediction: &Prediction) -> &'static str {
    if prediction.is_fallback() {
        "fallback"
    } else {
        "model"
    }
}
