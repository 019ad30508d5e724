//! Crop-specific environmental compensation
//!
//! Produces a percentage adjustment (nominally 100) from the crop's
//! optimal temperature band plus a VPD stress penalty. Cold conditions
//! push the output up, heat stress pulls it down to a protective floor.

use crate::tuning::TemperatureBand;

/// Heat-stress floor: compensation never drives a total shutdown
pub const COMPENSATION_FLOOR: f32 = 70.0;

/// Cold-compensation ceiling
pub const COMPENSATION_CEILING: f32 = 130.0;

/// VPD comfort range, kPa; outside it plants transpire poorly
pub const VPD_MIN: f32 = 0.4;
pub const VPD_MAX: f32 = 1.6;

/// Flat multiplicative penalty when VPD is outside the comfort range
const VPD_STRESS_PENALTY: f32 = 0.95;

/// Compensation percent for the given conditions, clamped to
/// `[70, 130]`
pub fn temperature_compensation(temperature: f32, vpd: f32, band: &TemperatureBand) -> f32 {
    if !temperature.is_finite() {
        return 100.0;
    }

    let mut compensation = if temperature < band.min {
        // Cold: push more light output
        100.0 + 2.0 * (band.min - temperature)
    } else if temperature > band.max {
        // Heat stress: back off, floored so the canopy is never dark
        (100.0 - 5.0 * (temperature - band.max)).max(COMPENSATION_FLOOR)
    } else if temperature > band.optimal && band.max > band.optimal {
        // Warm side of the band: linear taper down to -10% at the edge
        let fraction = (temperature - band.optimal) / (band.max - band.optimal);
        100.0 - 10.0 * fraction
    } else {
        100.0
    };

    if vpd.is_finite() && !(VPD_MIN..=VPD_MAX).contains(&vpd) {
        compensation *= VPD_STRESS_PENALTY;
    }

    compensation.clamp(COMPENSATION_FLOOR, COMPENSATION_CEILING)
}
