//! Core data models for the lighting optimization engine

use serde::{Deserialize, Serialize};

/// Crop growth stage, used to select PID tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthStage {
    Vegetative,
    Flowering,
    Other,
}

/// Per-zone working state, read fresh from the zone-configuration
/// collaborator at the start of each optimization call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneState {
    /// Current supplemental-light intensity, 0-100 %
    pub intensity: f32,
    /// Photoperiod in hours
    pub photoperiod: f32,
    /// Installed fixture power at full intensity, watts
    pub baseline_power: f32,
    /// Electricity rate, $/kWh
    pub electricity_rate: f32,
    pub growth_stage: GrowthStage,
    /// Key into the crop tuning tables
    pub crop_type: String,
    /// Current facility demand, kW
    pub current_demand: f32,
    /// Contracted peak demand, kW
    pub max_demand: f32,
}

/// Snapshot of ambient conditions, immutable within one optimization call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentalFactors {
    /// Air temperature, degrees C
    pub temperature: f32,
    /// Relative humidity, %
    pub humidity: f32,
    /// CO2 concentration, ppm
    pub co2_level: f32,
    /// Vapor pressure deficit, kPa
    pub vpd: f32,
    /// Ambient solar radiation, W/m2
    pub solar_radiation: f32,
    /// Forecast cloud-cover fraction, 0-1 (demand prediction only)
    pub cloud_cover: f32,
}

/// Caller-supplied bounds for one optimization call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConstraints {
    /// Target daily light integral, mol/m2/day
    pub target_dli: f32,
    /// Lower intensity bound, defaults to 50 % when absent
    #[serde(default)]
    pub min_intensity: Option<f32>,
}

/// Final per-tick decision. Produced and returned; the engine keeps only
/// a copy for the observability surface and never persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationDecision {
    pub zone_id: String,
    /// Supplemental-light intensity to apply, rounded integer %
    pub intensity: u32,
    /// Advisory trust score, 0-100
    pub confidence: f32,
    /// Estimated daily savings, $
    pub estimated_savings: f32,
    /// Ordered human-readable trace of the fusion steps
    pub reasoning: Vec<String>,
    pub generated_at: i64,
}

/// One realized outcome reported back by the caller after a decision
/// has been applied to real dimmers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealizedOutcome {
    /// Intensity that was actually applied, %
    pub intensity: f32,
    pub photoperiod: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub co2_level: f32,
    pub solar_radiation: f32,
    /// DLI observed over the period, mol/m2/day
    pub observed_dli: f32,
    /// Unix seconds
    pub timestamp: i64,
}

/// Feature/label pair buffered for retraining the DLI predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: Vec<f32>,
    pub observed_dli: f32,
    pub recorded_at: i64,
}
