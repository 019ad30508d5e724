//! Model registry with graceful fallback
//!
//! Three independently trained regressors share one operating contract:
//! fixed feature vector in, one scalar out, closed-form rule when the
//! model is missing. The registry is read-mostly shared state; retrains
//! swap whole models atomically so concurrent readers never observe a
//! partial update.

use super::features::{DEMAND_OUTPUT_SCALE, DLI_OUTPUT_SCALE};
use super::regressor::{
    fallback_demand_reduction, fallback_dli, fallback_savings, LinearModel,
};
use crate::models::ZoneState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

/// The three model roles the engine consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    DliPredictor,
    DemandPredictor,
    SavingsEstimator,
}

impl ModelRole {
    /// File stem for the persisted weight artifact
    pub fn artifact_name(&self) -> &'static str {
        match self {
            ModelRole::DliPredictor => "dli_predictor",
            ModelRole::DemandPredictor => "demand_predictor",
            ModelRole::SavingsEstimator => "savings_estimator",
        }
    }
}

/// Where a prediction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionSource {
    Model,
    Fallback,
}

/// One scalar prediction with its provenance tag
#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub value: f32,
    pub source: PredictionSource,
}

impl Prediction {
    fn from_model(value: f32) -> Self {
        Self { value, source: PredictionSource::Model }
    }

    fn from_fallback(value: f32) -> Self {
        Self { value, source: PredictionSource::Fallback }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == PredictionSource::Fallback
    }
}

/// Registry of the three role models plus optional per-crop models
pub struct ModelRegistry {
    dli: RwLock<Option<LinearModel>>,
    demand: RwLock<Option<LinearModel>>,
    savings: RwLock<Option<LinearModel>>,
    crop_models: RwLock<HashMap<String, LinearModel>>,
    /// Demand fallback window `[start, end)`, local hours
    peak_window: (u32, u32),
}

impl ModelRegistry {
    pub fn new(peak_window: (u32, u32)) -> Self {
        Self {
            dli: RwLock::new(None),
            demand: RwLock::new(None),
            savings: RwLock::new(None),
            crop_models: RwLock::new(HashMap::new()),
            peak_window,
        }
    }

    fn read_slot(slot: &RwLock<Option<LinearModel>>) -> Option<LinearModel> {
        // A panicked writer cannot leave a LinearModel half-swapped, so
        // recovering from a poisoned lock is safe
        slot.read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_slot(slot: &RwLock<Option<LinearModel>>, model: LinearModel) {
        *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(model);
    }

    /// Predicted DLI, mol/m2/day
    pub fn predict_dli(&self, features: &[f32], state: &ZoneState) -> Prediction {
        match Self::read_slot(&self.dli) {
            Some(model) => Prediction::from_model(model.predict_scaled(features, DLI_OUTPUT_SCALE)),
            None => Prediction::from_fallback(fallback_dli(state.intensity, state.photoperiod)),
        }
    }

    /// Suggested demand reduction, percent (at most 30)
    pub fn predict_demand_reduction(&self, features: &[f32], hour: u32) -> Prediction {
        match Self::read_slot(&self.demand) {
            Some(model) => {
                Prediction::from_model(model.predict_scaled(features, DEMAND_OUTPUT_SCALE))
            }
            None => Prediction::from_fallback(fallback_demand_reduction(hour, self.peak_window)),
        }
    }

    /// Estimated savings, dollars
    pub fn estimate_savings(
        &self,
        features: &[f32],
        energy_saved_kwh: f32,
        electricity_rate: f32,
    ) -> Prediction {
        match Self::read_slot(&self.savings) {
            Some(model) => Prediction::from_model(model.predict_raw(features)),
            None => {
                Prediction::from_fallback(fallback_savings(energy_saved_kwh, electricity_rate))
            }
        }
    }

    /// Crop-specific intensity suggestion, if a model is registered for
    /// the crop
    pub fn crop_adjustment(&self, crop_type: &str, features: &[f32]) -> Option<f32> {
        self.crop_models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(crop_type)
            .map(|model| model.predict_scaled(features, 100.0))
    }

    /// Whether the DLI predictor has ever been trained or loaded
    pub fn dli_trained(&self) -> bool {
        self.dli
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Snapshot of the active DLI model for a retrain to start from
    pub fn snapshot_dli(&self) -> Option<LinearModel> {
        Self::read_slot(&self.dli)
    }

    /// Atomically swap in a new model for a role
    pub fn install(&self, role: ModelRole, model: LinearModel) {
        info!(
            role = role.artifact_name(),
            version = model.version,
            training_samples = model.training_samples,
            "Installing model"
        );
        let slot = match role {
            ModelRole::DliPredictor => &self.dli,
            ModelRole::DemandPredictor => &self.demand,
            ModelRole::SavingsEstimator => &self.savings,
        };
        Self::write_slot(slot, model);
    }

    pub fn install_crop_model(&self, crop_type: &str, model: LinearModel) {
        info!(crop_type, version = model.version, "Installing crop model");
        self.crop_models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(crop_type.to_string(), model);
    }

    /// Active version per role, `None` when the role runs on fallback
    pub fn versions(&self) -> HashMap<ModelRole, Option<u32>> {
        let mut versions = HashMap::new();
        versions.insert(ModelRole::DliPredictor, Self::read_slot(&self.dli).map(|m| m.version));
        versions.insert(ModelRole::DemandPredictor, Self::read_slot(&self.demand).map(|m| m.version));
        versions.insert(ModelRole::SavingsEstimator, Self::read_slot(&self.savings).map(|m| m.version));
        versions
    }
}
