//! Online learning loop: per-zone sample buffering and background
//! retraining with swap-on-success

mod buffer;
mod trainer;

pub use buffer::{SampleBuffer, RETAIN_AFTER_RETRAIN, RETRAIN_THRESHOLD};
pub use trainer::{
    train_dli_model, RetrainRequest, TrainerWorker, TrainingConfig, RETRAIN_QUEUE_DEPTH,
};
