//! Optimization tick loop
//!
//! Periodically pulls fresh zone snapshots from a provider, runs the
//! optimization pipeline for every zone, and emits the resulting
//! decisions over a channel with configurable interval and jitter.

use crate::engine::OptimizationEngine;
use crate::health::{components, HealthRegistry};
use crate::models::{EnvironmentalFactors, OptimizationConstraints, OptimizationDecision, ZoneState};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Everything the engine needs to optimize one zone on one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub zone_id: String,
    pub state: ZoneState,
    pub environment: EnvironmentalFactors,
    pub constraints: OptimizationConstraints,
}

/// Source of zone snapshots, one call per tick
#[async_trait]
pub trait ZoneProvider: Send + Sync {
    async fn snapshot(&self) -> Result<Vec<ZoneSnapshot>>;
}

/// Configuration for the optimization loop
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Base tick interval (default: 5 minutes)
    pub interval: Duration,
    /// Maximum jitter added to the interval (default: 5 seconds)
    pub jitter: Duration,
    /// Channel buffer size for emitted decisions
    pub buffer_size: usize,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            jitter: Duration::from_secs(5),
            buffer_size: 256,
        }
    }
}

/// Optimization loop that ticks every zone at a fixed cadence
pub struct OptimizationLoop {
    engine: Arc<OptimizationEngine>,
    provider: Arc<dyn ZoneProvider>,
    config: TickConfig,
    decision_tx: mpsc::Sender<OptimizationDecision>,
    health: Option<HealthRegistry>,
}

impl OptimizationLoop {
    pub fn new(
        engine: Arc<OptimizationEngine>,
        provider: Arc<dyn ZoneProvider>,
        config: TickConfig,
    ) -> (Self, mpsc::Receiver<OptimizationDecision>) {
        let (decision_tx, decision_rx) = mpsc::channel(config.buffer_size);
        let loop_instance = Self {
            engine,
            provider,
            config,
            decision_tx,
            health: None,
        };
        (loop_instance, decision_rx)
    }

    /// Report scheduler health (provider reachability) to a registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Run until shutdown fires
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting optimization loop"
        );

        let mut tick_count = 0u64;

        loop {
            // A fresh sleep per cycle: the first tick waits a full
            // interval and each cycle gets its own jitter
            tokio::select! {
                _ = sleep(self.current_interval()) => {
                    let start = Instant::now();
                    let results = self.tick_all().await;
                    tick_count += 1;

                    if tick_count % 12 == 0 {
                        // Hourly at the 5-minute default
                        debug!(
                            zones = results.success_count,
                            errors = results.error_count,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Optimization cycle complete"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down optimization loop");
                    break;
                }
            }
        }
    }

    fn current_interval(&self) -> Duration {
        // Jitter keeps co-located facilities from ticking in lockstep
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }

    /// Optimize every zone the provider reports
    async fn tick_all(&self) -> TickResults {
        let mut results = TickResults::default();

        let snapshots = match self.provider.snapshot().await {
            Ok(snapshots) => {
                if let Some(health) = &self.health {
                    health.set_healthy(components::SCHEDULER).await;
                }
                snapshots
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch zone snapshots");
                if let Some(health) = &self.health {
                    health
                        .set_unhealthy(components::SCHEDULER, format!("Zone provider failed: {e}"))
                        .await;
                }
                results.error_count += 1;
                return results;
            }
        };

        for snapshot in snapshots {
            let decision = self.engine.optimize_zone(
                &snapshot.zone_id,
                &snapshot.state,
                &snapshot.environment,
                &snapshot.constraints,
            );
            results.success_count += 1;

            if let Err(e) = self.decision_tx.send(decision).await {
                warn!(error = %e, "Failed to send decision to channel");
            }
        }

        results
    }
}

/// Results from one optimization cycle
#[derive(Debug, Default)]
struct TickResults {
    success_count: usize,
    error_count: usize,
}

/// Generate a random jitter value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    // Time-derived jitter is enough here; no RNG dependency needed
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}
