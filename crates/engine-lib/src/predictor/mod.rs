//! Predictive model registry: three online-trained regressors with
//! rule-based fallbacks, plus durable weight artifacts

pub mod features;
mod registry;
mod regressor;
mod store;

pub use features::{
    DEMAND_FEATURES, DEMAND_OUTPUT_SCALE, DLI_FEATURES, DLI_OUTPUT_SCALE, INTENSITY_TO_PPFD,
    SAVINGS_FEATURES,
};
pub use registry::{ModelRegistry, ModelRole, Prediction, PredictionSource};
pub use regressor::{fallback_demand_reduction, fallback_dli, fallback_savings, LinearModel};
pub use store::ModelStore;
