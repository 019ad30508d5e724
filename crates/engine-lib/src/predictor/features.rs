//! Feature engineering for the predictive models
//!
//! Each model role consumes a fixed-size vector of unit-range features.
//! Normalization divisors are part of the model contract: retraining and
//! inference must agree on them, so they live here as constants.

use crate::models::{EnvironmentalFactors, RealizedOutcome, ZoneState};
use chrono::{DateTime, Datelike, Timelike, Utc};

/// DLI predictor input width
pub const DLI_FEATURES: usize = 7;

/// Demand-response predictor input width
pub const DEMAND_FEATURES: usize = 6;

/// Savings estimator input width
pub const SAVINGS_FEATURES: usize = 5;

/// Typical DLI ceiling used to scale the DLI predictor output
pub const DLI_OUTPUT_SCALE: f32 = 50.0;

/// Maximum suggested demand reduction, percent
pub const DEMAND_OUTPUT_SCALE: f32 = 30.0;

/// Fixed intensity-percent to PPFD conversion for the DLI fallback
/// (100 % is roughly a 1000 umol/m2/s supplemental fixture)
pub const INTENSITY_TO_PPFD: f32 = 10.0;

fn unit(value: f32, divisor: f32) -> f32 {
    if !value.is_finite() || divisor <= 0.0 {
        return 0.0;
    }
    (value / divisor).clamp(0.0, 1.0)
}

/// Features for the DLI predictor:
/// [intensity, photoperiod, temperature, humidity, co2, solar, hour]
pub fn dli_features(
    state: &ZoneState,
    env: &EnvironmentalFactors,
    when: DateTime<Utc>,
) -> Vec<f32> {
    vec![
        unit(state.intensity, 100.0),
        unit(state.photoperiod, 24.0),
        unit(env.temperature, 40.0),
        unit(env.humidity, 100.0),
        unit(env.co2_level, 2000.0),
        unit(env.solar_radiation, 1000.0),
        when.hour() as f32 / 24.0,
    ]
}

/// Features for the demand-response predictor:
/// [hour, day-of-week, rate, temperature, demand ratio, cloud cover]
pub fn demand_features(
    state: &ZoneState,
    env: &EnvironmentalFactors,
    when: DateTime<Utc>,
) -> Vec<f32> {
    let demand_ratio = if state.max_demand > 0.0 {
        unit(state.current_demand, state.max_demand)
    } else {
        0.0
    };
    vec![
        when.hour() as f32 / 24.0,
        when.weekday().num_days_from_monday() as f32 / 7.0,
        state.electricity_rate.max(0.0),
        unit(env.temperature, 40.0),
        demand_ratio,
        env.cloud_cover.clamp(0.0, 1.0),
    ]
}

/// Features for the savings estimator:
/// [energy saved, rate, month, temperature, solar]
pub fn savings_features(
    energy_saved_kwh: f32,
    electricity_rate: f32,
    env: &EnvironmentalFactors,
    when: DateTime<Utc>,
) -> Vec<f32> {
    vec![
        energy_saved_kwh.max(0.0),
        electricity_rate.max(0.0),
        when.month() as f32 / 12.0,
        unit(env.temperature, 40.0),
        unit(env.solar_radiation, 1000.0),
    ]
}

/// DLI feature vector for a realized outcome, used as the training input
pub fn outcome_features(outcome: &RealizedOutcome) -> Vec<f32> {
    let hour = DateTime::from_timestamp(outcome.timestamp, 0)
        .unwrap_or_else(Utc::now)
        .hour();
    vec![
        unit(outcome.intensity, 100.0),
        unit(outcome.photoperiod, 24.0),
        unit(outcome.temperature, 40.0),
        unit(outcome.humidity, 100.0),
        unit(outcome.co2_level, 2000.0),
        unit(outcome.solar_radiation, 1000.0),
        hour as f32 / 24.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GrowthStage;
    use chrono::TimeZone;

    fn test_state() -> ZoneState {
        ZoneState {
            intensity: 60.0,
            photoperiod: 16.0,
            baseline_power: 50_000.0,
            electricity_rate: 0.12,
            growth_stage: GrowthStage::Vegetative,
            crop_type: "lettuce".to_string(),
            current_demand: 400.0,
            max_demand: 500.0,
        }
    }

    fn test_env() -> EnvironmentalFactors {
        EnvironmentalFactors {
            temperature: 22.0,
            humidity: 65.0,
            co2_level: 900.0,
            vpd: 1.0,
            solar_radiation: 250.0,
            cloud_cover: 0.3,
        }
    }

    #[test]
    fn test_dli_features_normalized() {
        let when = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let f = dli_features(&test_state(), &test_env(), when);
        assert_eq!(f.len(), DLI_FEATURES);
        for v in &f {
            assert!((0.0..=1.0).contains(v), "feature {v} out of unit range");
        }
        assert!((f[0] - 0.6).abs() < 1e-6);
        assert!((f[6] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_demand_features_guard_zero_max_demand() {
        let mut state = test_state();
        state.max_demand = 0.0;
        let when = Utc.with_ymd_and_hms(2026, 6, 15, 15, 0, 0).unwrap();
        let f = demand_features(&state, &test_env(), when);
        assert_eq!(f.len(), DEMAND_FEATURES);
        assert_eq!(f[4], 0.0);
    }

    #[test]
    fn test_pathological_env_stays_bounded() {
        let env = EnvironmentalFactors {
            temperature: 1000.0,
            humidity: -40.0,
            co2_level: f32::NAN,
            vpd: -1.0,
            solar_radiation: 1e9,
            cloud_cover: 5.0,
        };
        let when = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let f = dli_features(&test_state(), &env, when);
        for v in &f {
            assert!((0.0..=1.0).contains(v));
        }
        let f = demand_features(&test_state(), &env, when);
        for v in f.iter().take(2).chain(f.iter().skip(3)) {
            assert!((0.0..=1.0).contains(v));
        }
    }

    #[test]
    fn test_savings_features_month() {
        let env = test_env();
        let when = Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap();
        let f = savings_features(120.0, 0.12, &env, when);
        assert_eq!(f.len(), SAVINGS_FEATURES);
        assert!((f[2] - 0.75).abs() < 1e-6);
        assert_eq!(f[0], 120.0);
    }

    #[test]
    fn test_outcome_features_match_dli_layout() {
        let when = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let state = test_state();
        let env = test_env();
        let outcome = RealizedOutcome {
            intensity: state.intensity,
            photoperiod: state.photoperiod,
            temperature: env.temperature,
            humidity: env.humidity,
            co2_level: env.co2_level,
            solar_radiation: env.solar_radiation,
            observed_dli: 16.5,
            timestamp: when.timestamp(),
        };
        assert_eq!(outcome_features(&outcome), dli_features(&state, &env, when));
    }
}
