//! Engine error taxonomy
//!
//! None of these surface to `optimize_zone` callers: model and training
//! failures degrade to fallbacks, and only the model store and the
//! trainer report errors to their own callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid constraints: {0}")]
    InvalidConstraints(String),

    #[error("training rejected: {0}")]
    Training(String),

    #[error("model artifact checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("model store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
