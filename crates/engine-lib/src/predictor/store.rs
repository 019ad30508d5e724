//! Durable model artifacts: load-on-start, save-on-retrain
//!
//! Artifacts are JSON envelopes carrying the serialized weights and a
//! SHA-256 checksum of them. Writes go through a temp file and an atomic
//! rename so a crash mid-save never corrupts the active artifact.

use super::registry::ModelRole;
use super::regressor::LinearModel;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Serialize, Deserialize)]
struct ModelArtifact {
    checksum: String,
    model: LinearModel,
}

/// Directory of named model artifacts
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn artifact_path(&self, role: ModelRole) -> PathBuf {
        self.dir.join(format!("{}.json", role.artifact_name()))
    }

    /// Load a role's weights, `Ok(None)` when no artifact exists
    pub fn load(&self, role: ModelRole) -> Result<Option<LinearModel>, EngineError> {
        let path = self.artifact_path(role);
        if !path.exists() {
            debug!(role = role.artifact_name(), "No model artifact on disk");
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&data)?;

        let computed = compute_checksum(&serde_json::to_vec(&artifact.model)?);
        if computed != artifact.checksum {
            return Err(EngineError::ChecksumMismatch {
                expected: artifact.checksum,
                actual: computed,
            });
        }

        info!(
            role = role.artifact_name(),
            version = artifact.model.version,
            path = %path.display(),
            "Loaded model artifact"
        );
        Ok(Some(artifact.model))
    }

    /// Persist a role's weights atomically
    pub fn save(&self, role: ModelRole, model: &LinearModel) -> Result<(), EngineError> {
        let weights = serde_json::to_vec(model)?;
        let artifact = ModelArtifact {
            checksum: compute_checksum(&weights),
            model: model.clone(),
        };
        let data = serde_json::to_vec_pretty(&artifact)?;

        let path = self.artifact_path(role);
        write_atomic(&path, &data)?;

        info!(
            role = role.artifact_name(),
            version = model.version,
            path = %path.display(),
            "Saved model artifact"
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), EngineError> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        assert!(store.load(ModelRole::DliPredictor).unwrap().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();

        let mut model = LinearModel::zeroed(7);
        model.bias = 0.34;
        model.version = 5;
        model.training_samples = 100;
        store.save(ModelRole::DliPredictor, &model).unwrap();

        let loaded = store.load(ModelRole::DliPredictor).unwrap().unwrap();
        assert_eq!(loaded.version, 5);
        assert_eq!(loaded.bias, 0.34);
        assert_eq!(loaded.training_samples, 100);
    }

    #[test]
    fn test_roles_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();

        let mut dli = LinearModel::zeroed(7);
        dli.version = 1;
        let mut demand = LinearModel::zeroed(6);
        demand.version = 9;
        store.save(ModelRole::DliPredictor, &dli).unwrap();
        store.save(ModelRole::DemandPredictor, &demand).unwrap();

        assert_eq!(store.load(ModelRole::DliPredictor).unwrap().unwrap().version, 1);
        assert_eq!(store.load(ModelRole::DemandPredictor).unwrap().unwrap().version, 9);
    }

    #[test]
    fn test_tampered_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();

        let model = LinearModel::zeroed(7);
        store.save(ModelRole::SavingsEstimator, &model).unwrap();

        // Flip the stored bias without updating the checksum
        let path = dir.path().join("savings_estimator.json");
        let text = fs::read_to_string(&path).unwrap();
        let tampered = text.replace("\"bias\": 0.0", "\"bias\": 9.0");
        assert_ne!(text, tampered);
        fs::write(&path, tampered).unwrap();

        let result = store.load(ModelRole::SavingsEstimator);
        assert!(matches!(result, Err(EngineError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_save_overwrites_previous_version() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();

        let mut model = LinearModel::zeroed(7);
        model.version = 1;
        store.save(ModelRole::DliPredictor, &model).unwrap();
        model.version = 2;
        store.save(ModelRole::DliPredictor, &model).unwrap();

        assert_eq!(store.load(ModelRole::DliPredictor).unwrap().unwrap().version, 2);
    }
}
