//! Linear regressors and the closed-form fallbacks behind them
//!
//! Models are small per-deployment regressors fine-tuned online; a
//! missing or failed model always degrades to the documented rule-based
//! estimate, never to an error.

use super::features::{DEMAND_OUTPUT_SCALE, INTENSITY_TO_PPFD};
use serde::{Deserialize, Serialize};

/// Weights of one trained regressor, versioned in memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f32>,
    pub bias: f32,
    pub version: u32,
    pub trained_at: i64,
    pub training_samples: usize,
}

impl LinearModel {
    /// Untrained model of the given input width
    pub fn zeroed(num_features: usize) -> Self {
        Self {
            weights: vec![0.0; num_features],
            bias: 0.0,
            version: 0,
            trained_at: 0,
            training_samples: 0,
        }
    }

    /// Raw affine output; extra features beyond the weight vector are
    /// ignored, missing ones contribute nothing
    pub fn raw_output(&self, features: &[f32]) -> f32 {
        let dot: f32 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum();
        dot + self.bias
    }

    /// Output squashed to unit range and scaled to the role's ceiling
    pub fn predict_scaled(&self, features: &[f32], output_scale: f32) -> f32 {
        let raw = self.raw_output(features);
        if !raw.is_finite() {
            return 0.0;
        }
        raw.clamp(0.0, 1.0) * output_scale
    }

    /// Unscaled output floored at zero (dollar estimates)
    pub fn predict_raw(&self, features: &[f32]) -> f32 {
        let raw = self.raw_output(features);
        if !raw.is_finite() {
            return 0.0;
        }
        raw.max(0.0)
    }
}

/// Rule-based DLI estimate: fixed intensity-to-PPFD conversion
/// integrated over the photoperiod
pub fn fallback_dli(intensity: f32, photoperiod: f32) -> f32 {
    let ppfd = intensity.clamp(0.0, 100.0) * INTENSITY_TO_PPFD;
    ppfd * photoperiod.clamp(0.0, 24.0) * 3600.0 / 1e6
}

/// Rule-based demand reduction: half the maximum reduction inside the
/// configured peak window `[start, end)`, nothing outside it
pub fn fallback_demand_reduction(hour: u32, window: (u32, u32)) -> f32 {
    let (start, end) = window;
    let in_window = if start <= end {
        hour >= start && hour < end
    } else {
        // Window spans midnight
        hour >= start || hour < end
    };
    if in_window {
        DEMAND_OUTPUT_SCALE / 2.0
    } else {
        0.0
    }
}

/// Rule-based savings: energy saved at the going rate
pub fn fallback_savings(energy_saved_kwh: f32, electricity_rate: f32) -> f32 {
    (energy_saved_kwh * electricity_rate).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_model_predicts_zero() {
        let model = LinearModel::zeroed(7);
        assert_eq!(model.predict_scaled(&[0.5; 7], 50.0), 0.0);
        assert_eq!(model.version, 0);
    }

    #[test]
    fn test_scaled_prediction_clamped() {
        let mut model = LinearModel::zeroed(2);
        model.bias = 3.0; // raw output well above 1
        assert_eq!(model.predict_scaled(&[0.0, 0.0], 50.0), 50.0);
        model.bias = -3.0;
        assert_eq!(model.predict_scaled(&[0.0, 0.0], 50.0), 0.0);
    }

    #[test]
    fn test_bias_only_prediction() {
        let mut model = LinearModel::zeroed(7);
        model.bias = 0.34;
        let dli = model.predict_scaled(&[0.0; 7], 50.0);
        assert!((dli - 17.0).abs() < 1e-4);
    }

    #[test]
    fn test_feature_length_mismatch_tolerated() {
        let mut model = LinearModel::zeroed(3);
        model.weights = vec![1.0, 1.0, 1.0];
        // Extra features ignored
        assert_eq!(model.raw_output(&[0.1, 0.2, 0.3, 9.0]), 0.6);
        // Short input contributes only what it has
        assert!((model.raw_output(&[0.1]) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_dli_formula() {
        // 60% intensity -> 600 PPFD, 16h photoperiod
        let dli = fallback_dli(60.0, 16.0);
        assert!((dli - 34.56).abs() < 0.01);
        assert_eq!(fallback_dli(0.0, 16.0), 0.0);
    }

    #[test]
    fn test_fallback_demand_window_boundaries() {
        let window = (14, 19);
        assert_eq!(fallback_demand_reduction(13, window), 0.0);
        assert_eq!(fallback_demand_reduction(14, window), 15.0);
        assert_eq!(fallback_demand_reduction(18, window), 15.0);
        assert_eq!(fallback_demand_reduction(19, window), 0.0);
    }

    #[test]
    fn test_fallback_demand_window_spanning_midnight() {
        let window = (22, 2);
        assert_eq!(fallback_demand_reduction(23, window), 15.0);
        assert_eq!(fallback_demand_reduction(1, window), 15.0);
        assert_eq!(fallback_demand_reduction(12, window), 0.0);
    }

    #[test]
    fn test_fallback_savings() {
        assert!((fallback_savings(120.0, 0.12) - 14.4).abs() < 1e-4);
        assert_eq!(fallback_savings(-5.0, 0.12), 0.0);
    }
}
