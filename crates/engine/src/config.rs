//! Service configuration

use anyhow::Result;
use serde::Deserialize;

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Facility name used to tag structured logs
    #[serde(default = "default_facility_name")]
    pub facility_name: String,

    /// API server port for health/metrics/decisions
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Optimization tick interval in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Directory for persisted model weight artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    /// Zone snapshot file ticked by the optimization loop; when absent,
    /// decisions are only produced on demand
    #[serde(default)]
    pub zones_file: Option<String>,
}

fn default_facility_name() -> String {
    std::env::var("FACILITY_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_tick_interval() -> u64 {
    300
}

fn default_model_dir() -> String {
    "/var/lib/lighting-engine/models".to_string()
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENGINE"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| ServiceConfig {
            facility_name: default_facility_name(),
            api_port: default_api_port(),
            tick_interval_secs: default_tick_interval(),
            model_dir: default_model_dir(),
            zones_file: None,
        }))
    }
}
