//! Online retraining of the DLI predictor
//!
//! Training runs off the optimize path: batches arrive over a channel,
//! gradient descent happens on a blocking task against a snapshot of the
//! active weights, and the result swaps in atomically only when the
//! held-out validation loss is acceptable. A failed or diverging retrain
//! leaves the previously-active model untouched.

use crate::error::EngineError;
use crate::models::TrainingSample;
use crate::observability::EngineMetrics;
use crate::predictor::{LinearModel, ModelRegistry, ModelRole, ModelStore, DLI_FEATURES, DLI_OUTPUT_SCALE};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Retrain channel depth; a full queue drops batches rather than
/// blocking the optimize path
pub const RETRAIN_QUEUE_DEPTH: usize = 8;

/// Training hyperparameters
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Epoch cap so a slow run cannot starve the scheduler
    pub epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
    /// Fraction of the batch held out for validation
    pub validation_split: f32,
    /// Reject threshold on held-out MSE (normalized label scale)
    pub max_validation_loss: f32,
    /// Batches smaller than this are rejected outright
    pub min_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            learning_rate: 0.05,
            batch_size: 16,
            validation_split: 0.2,
            max_validation_loss: 0.05,
            min_samples: 20,
        }
    }
}

/// One batch of samples for a zone, taken when its buffer filled
#[derive(Debug)]
pub struct RetrainRequest {
    pub zone_id: String,
    pub samples: Vec<TrainingSample>,
}

/// Train new DLI predictor weights from a sample batch
///
/// Labels are normalized to the model's unit output scale. The last
/// `validation_split` of the batch is held out; training never sees it.
pub fn train_dli_model(
    base: Option<&LinearModel>,
    samples: &[TrainingSample],
    config: &TrainingConfig,
) -> Result<LinearModel, EngineError> {
    if samples.len() < config.min_samples {
        return Err(EngineError::Training(format!(
            "{} samples, need at least {}",
            samples.len(),
            config.min_samples
        )));
    }

    let holdout = ((samples.len() as f32 * config.validation_split) as usize)
        .clamp(1, samples.len() - 1);
    let (train_set, validation_set) = samples.split_at(samples.len() - holdout);

    let mut weights = match base {
        Some(model) if model.weights.len() == DLI_FEATURES => model.weights.clone(),
        _ => vec![0.0; DLI_FEATURES],
    };
    let mut bias = base.map(|m| m.bias).unwrap_or(0.0);

    let batch_size = config.batch_size.max(1);
    for _ in 0..config.epochs {
        for chunk in train_set.chunks(batch_size) {
            let mut grad_w = vec![0.0f32; DLI_FEATURES];
            let mut grad_b = 0.0f32;
            for sample in chunk {
                let prediction = dot(&weights, &sample.features) + bias;
                let residual = prediction - normalized_label(sample);
                for (g, x) in grad_w.iter_mut().zip(sample.features.iter()) {
                    *g += residual * x;
                }
                grad_b += residual;
            }
            let step = 2.0 * config.learning_rate / chunk.len() as f32;
            for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
                *w -= step * g;
            }
            bias -= step * grad_b;
        }
    }

    let validation_loss = mean_squared_error(&weights, bias, validation_set);
    if !validation_loss.is_finite() || validation_loss > config.max_validation_loss {
        return Err(EngineError::Training(format!(
            "validation loss {validation_loss:.4} exceeds {:.4}",
            config.max_validation_loss
        )));
    }

    Ok(LinearModel {
        weights,
        bias,
        version: base.map(|m| m.version + 1).unwrap_or(1),
        trained_at: chrono::Utc::now().timestamp(),
        training_samples: samples.len(),
    })
}

fn normalized_label(sample: &TrainingSample) -> f32 {
    (sample.observed_dli / DLI_OUTPUT_SCALE).clamp(0.0, 1.0)
}

fn dot(weights: &[f32], features: &[f32]) -> f32 {
    weights
        .iter()
        .zip(features.iter())
        .map(|(w, x)| w * x)
        .sum()
}

fn mean_squared_error(weights: &[f32], bias: f32, samples: &[TrainingSample]) -> f32 {
    if samples.is_empty() {
        return f32::INFINITY;
    }
    let sum: f32 = samples
        .iter()
        .map(|s| {
            let residual = dot(weights, &s.features) + bias - normalized_label(s);
            residual * residual
        })
        .sum();
    sum / samples.len() as f32
}

/// Background worker consuming retrain batches
pub struct TrainerWorker {
    registry: Arc<ModelRegistry>,
    store: Option<Arc<ModelStore>>,
    config: TrainingConfig,
    rx: mpsc::Receiver<RetrainRequest>,
    metrics: EngineMetrics,
}

impl TrainerWorker {
    pub fn new(
        registry: Arc<ModelRegistry>,
        store: Option<Arc<ModelStore>>,
        config: TrainingConfig,
    ) -> (Self, mpsc::Sender<RetrainRequest>) {
        let (tx, rx) = mpsc::channel(RETRAIN_QUEUE_DEPTH);
        let worker = Self {
            registry,
            store,
            config,
            rx,
            metrics: EngineMetrics::new(),
        };
        (worker, tx)
    }

    /// Consume batches until the channel closes or shutdown fires
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting retrain worker");
        loop {
            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    info!("Shutting down retrain worker");
                    break;
                }
            }
        }
    }

    async fn handle(&self, request: RetrainRequest) {
        let start = Instant::now();
        let zone_id = request.zone_id;
        let sample_count = request.samples.len();

        let base = self.registry.snapshot_dli();
        let config = self.config.clone();
        let samples = request.samples;
        let result =
            tokio::task::spawn_blocking(move || train_dli_model(base.as_ref(), &samples, &config))
                .await;

        match result {
            Ok(Ok(model)) => {
                let version = model.version;
                if let Some(store) = &self.store {
                    if let Err(e) = store.save(ModelRole::DliPredictor, &model) {
                        warn!(zone_id, error = %e, "Failed to persist retrained model");
                    }
                }
                self.registry.install(ModelRole::DliPredictor, model);
                self.metrics.observe_retrain_latency(start.elapsed().as_secs_f64());
                self.metrics.inc_retrains_completed();
                info!(
                    zone_id,
                    version,
                    samples = sample_count,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "DLI predictor retrained"
                );
            }
            Ok(Err(e)) => {
                self.metrics.inc_retrain_failures();
                warn!(zone_id, error = %e, "Retrain rejected, keeping active weights");
            }
            Err(e) => {
                self.metrics.inc_retrain_failures();
                warn!(zone_id, error = %e, "Retrain task panicked, keeping active weights");
            }
        }
    }
}
