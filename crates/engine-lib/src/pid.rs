//! Per-zone PID controller bank
//!
//! The controlled quantity is an intensity *reduction*, so the error sign
//! is inverted relative to the DLI error: running under target must
//! shrink the reduction and push intensity up. The integral term is
//! clamped to bound windup, and pure control action never drops below
//! half intensity.

use crate::models::GrowthStage;
use crate::tuning::{PidGains, TuningTable};
use dashmap::DashMap;
use std::sync::Mutex;
use tracing::warn;

/// Anti-windup clamp on the accumulated integral term
pub const INTEGRAL_LIMIT: f32 = 50.0;

/// Conservative lower bound on pure control output
pub const DEFAULT_OUTPUT_MIN: f32 = 50.0;

pub const DEFAULT_OUTPUT_MAX: f32 = 100.0;

/// Discrete PID controller, one long-lived instance per zone
///
/// State is in-memory only; a process restart loses integral history,
/// which re-converges within a few cycles.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral: f32,
    previous_error: f32,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self::with_bounds(gains, DEFAULT_OUTPUT_MIN, DEFAULT_OUTPUT_MAX)
    }

    pub fn with_bounds(gains: PidGains, output_min: f32, output_max: f32) -> Self {
        Self {
            gains,
            integral: 0.0,
            previous_error: 0.0,
            output_min,
            output_max,
        }
    }

    /// One control step: `current` is the predicted DLI, `setpoint` the
    /// target DLI. Returns an intensity in `[output_min, output_max]`.
    pub fn update(&mut self, current: f32, setpoint: f32) -> f32 {
        if !current.is_finite() || !setpoint.is_finite() {
            return self.output_max;
        }

        // Inverted sign: the PID acts on the reduction, not the DLI
        let error = current - setpoint;

        self.integral = (self.integral + error).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        let p = self.gains.kp * error;
        let i = self.gains.ki * self.integral;
        let d = self.gains.kd * (error - self.previous_error);
        self.previous_error = error;

        let raw = 100.0 - (p + i + d);
        raw.clamp(self.output_min, self.output_max)
    }

    /// Clear accumulated state; gains and bounds are kept
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}

/// One controller per zone, created lazily with crop/stage tuning
///
/// Each controller sits behind its own mutex: the scheduler is expected
/// to tick a zone sequentially, but interleaved updates from a
/// misbehaving deployment would corrupt the integral term otherwise.
pub struct PidBank {
    controllers: DashMap<String, Mutex<PidController>>,
    tuning: TuningTable,
}

impl PidBank {
    pub fn new(tuning: TuningTable) -> Self {
        Self {
            controllers: DashMap::new(),
            tuning,
        }
    }

    /// Run one control step for a zone, creating its controller on first
    /// use with gains looked up from `(crop_type, growth_stage)`
    pub fn run(
        &self,
        zone_id: &str,
        crop_type: &str,
        stage: GrowthStage,
        current: f32,
        setpoint: f32,
    ) -> f32 {
        let entry = self
            .controllers
            .entry(zone_id.to_string())
            .or_insert_with(|| Mutex::new(PidController::new(self.tuning.pid_gains(crop_type, stage))));

        // Drop the guard before the map entry it borrows
        let output = match entry.lock() {
            Ok(mut controller) => controller.update(current, setpoint),
            Err(poisoned) => {
                warn!(zone_id, "PID controller mutex poisoned, recovering");
                poisoned.into_inner().update(current, setpoint)
            }
        };
        output
    }

    /// Explicitly reset a zone's controller (e.g., after a crop change)
    pub fn reset(&self, zone_id: &str) {
        if let Some(entry) = self.controllers.get(zone_id) {
            if let Ok(mut controller) = entry.lock() {
                controller.reset();
            }
        }
    }

    /// Current integral term for a zone, if it has a controller
    pub fn integral(&self, zone_id: &str) -> Option<f32> {
        self.controllers
            .get(zone_id)
            .and_then(|entry| entry.lock().ok().map(|c| c.integral()))
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
