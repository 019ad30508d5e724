//! Static configuration surface: per-crop PID gains, temperature bands,
//! fusion weights, and learning-loop thresholds
//!
//! Every table has defined defaults for unrecognized crops so the engine
//! never fails a lookup. Deployments override the tables through the
//! service configuration; none of these values are physical constants.

use crate::models::GrowthStage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// PID gains for one crop/stage combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Gains keyed by growth stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StageGains {
    pub vegetative: PidGains,
    pub flowering: PidGains,
}

/// Optimal temperature band for one crop, degrees C
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemperatureBand {
    pub min: f32,
    pub optimal: f32,
    pub max: f32,
}

/// Gains for crops without a tuning entry
pub const DEFAULT_GAINS: PidGains = PidGains {
    kp: 1.2,
    ki: 0.25,
    kd: 0.2,
};

/// Band for crops without a tuning entry
pub const DEFAULT_BAND: TemperatureBand = TemperatureBand {
    min: 15.0,
    optimal: 24.0,
    max: 30.0,
};

/// Per-crop tuning tables with built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningTable {
    pub gains: HashMap<String, StageGains>,
    pub bands: HashMap<String, TemperatureBand>,
}

impl Default for TuningTable {
    fn default() -> Self {
        let mut gains = HashMap::new();
        // Fast-growing leafy crops tolerate aggressive correction;
        // flowering-stage high-value crops get conservative gains to
        // avoid stress-inducing overshoot.
        gains.insert(
            "lettuce".to_string(),
            StageGains {
                vegetative: PidGains { kp: 2.0, ki: 0.4, kd: 0.3 },
                flowering: PidGains { kp: 1.5, ki: 0.3, kd: 0.2 },
            },
        );
        gains.insert(
            "tomato".to_string(),
            StageGains {
                vegetative: PidGains { kp: 1.5, ki: 0.3, kd: 0.25 },
                flowering: PidGains { kp: 1.0, ki: 0.2, kd: 0.3 },
            },
        );
        gains.insert(
            "cannabis".to_string(),
            StageGains {
                vegetative: PidGains { kp: 1.8, ki: 0.35, kd: 0.25 },
                flowering: PidGains { kp: 0.8, ki: 0.15, kd: 0.35 },
            },
        );
        gains.insert(
            "strawberry".to_string(),
            StageGains {
                vegetative: PidGains { kp: 1.4, ki: 0.3, kd: 0.2 },
                flowering: PidGains { kp: 0.9, ki: 0.2, kd: 0.3 },
            },
        );

        let mut bands = HashMap::new();
        bands.insert("lettuce".to_string(), TemperatureBand { min: 15.0, optimal: 22.0, max: 27.0 });
        bands.insert("tomato".to_string(), TemperatureBand { min: 15.0, optimal: 25.0, max: 32.0 });
        bands.insert("cannabis".to_string(), TemperatureBand { min: 18.0, optimal: 26.0, max: 32.0 });
        bands.insert("strawberry".to_string(), TemperatureBand { min: 10.0, optimal: 18.0, max: 26.0 });

        Self { gains, bands }
    }
}

impl TuningTable {
    /// Gains for a crop and stage, falling back to [`DEFAULT_GAINS`]
    pub fn pid_gains(&self, crop_type: &str, stage: GrowthStage) -> PidGains {
        match self.gains.get(crop_type) {
            Some(g) => match stage {
                GrowthStage::Vegetative => g.vegetative,
                GrowthStage::Flowering => g.flowering,
                GrowthStage::Other => DEFAULT_GAINS,
            },
            None => DEFAULT_GAINS,
        }
    }

    /// Temperature band for a crop, falling back to [`DEFAULT_BAND`]
    pub fn temperature_band(&self, crop_type: &str) -> TemperatureBand {
        self.bands.get(crop_type).copied().unwrap_or(DEFAULT_BAND)
    }
}

/// Weights for the decision fusion step
///
/// The defaults were inherited from field deployments with no documented
/// derivation. Tune per deployment; they must sum to roughly 1.0 for the
/// fused value to stay on the intensity scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub pid: f32,
    pub demand: f32,
    pub environment: f32,
    pub floor: f32,
    /// Conservative floor contribution, keeps all-zero signals from
    /// collapsing the output
    pub floor_value: f32,
    /// Share of the crop-specific model when one is registered
    pub crop_blend: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            pid: 0.4,
            demand: 0.3,
            environment: 0.2,
            floor: 0.1,
            floor_value: 95.0,
            crop_blend: 0.3,
        }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fusion: FusionWeights,
    pub tuning: TuningTable,
    /// Demand-response fallback window start hour, inclusive.
    /// Tariff-specific; the default matches a typical US afternoon peak.
    pub peak_window_start: u32,
    /// Window end hour, exclusive
    pub peak_window_end: u32,
    /// Buffered samples that trigger a retrain
    pub retrain_threshold: usize,
    /// Samples retained after a retrain batch is taken
    pub retain_after_retrain: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fusion: FusionWeights::default(),
            tuning: TuningTable::default(),
            peak_window_start: 14,
            peak_window_end: 19,
            retrain_threshold: crate::learning::RETRAIN_THRESHOLD,
            retain_after_retrain: crate::learning::RETAIN_AFTER_RETRAIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_crop_gains() {
        let table = TuningTable::default();
        let veg = table.pid_gains("lettuce", GrowthStage::Vegetative);
        let flower = table.pid_gains("cannabis", GrowthStage::Flowering);
        // Leafy vegetative gains are more aggressive than flowering
        // high-value gains
        assert!(veg.kp > flower.kp);
    }

    #[test]
    fn test_unknown_crop_falls_back() {
        let table = TuningTable::default();
        assert_eq!(table.pid_gains("kohlrabi", GrowthStage::Vegetative), DEFAULT_GAINS);
        let band = table.temperature_band("kohlrabi");
        assert_eq!(band.optimal, DEFAULT_BAND.optimal);
    }

    #[test]
    fn test_other_stage_uses_default_gains() {
        let table = TuningTable::default();
        assert_eq!(table.pid_gains("lettuce", GrowthStage::Other), DEFAULT_GAINS);
    }

    #[test]
    fn test_fusion_weights_sum_near_one() {
        let w = FusionWeights::default();
        let sum = w.pid + w.demand + w.environment + w.floor;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{ "peak_window_start": 16, "peak_window_end": 21 }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.peak_window_start, 16);
        assert_eq!(cfg.peak_window_end, 21);
        // Untouched fields keep defaults
        assert_eq!(cfg.retrain_threshold, 100);
        assert!(cfg.tuning.gains.contains_key("lettuce"));
    }
}
