//! Engine library for adaptive horticultural lighting
//!
//! This crate provides the core functionality for:
//! - Per-zone PID control toward a daily light integral target
//! - Predictive models with rule-based fallbacks
//! - Crop-specific environmental compensation
//! - Confidence-weighted decision fusion
//! - Online learning with background retraining
//! - Health checks and observability

pub mod compensation;
pub mod engine;
pub mod error;
pub mod health;
pub mod learning;
pub mod models;
pub mod observability;
pub mod pid;
pub mod predictor;
pub mod scheduler;
pub mod tuning;

pub use engine::OptimizationEngine;
pub use error::EngineError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use tuning::EngineConfig;
