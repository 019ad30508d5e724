//! File-backed zone snapshot provider
//!
//! Reads the full zone list from a JSON file on every tick, so an
//! operator can edit targets or crop assignments without a restart.

use anyhow::{Context, Result};
use async_trait::async_trait;
use engine_lib::scheduler::{ZoneProvider, ZoneSnapshot};
use std::path::PathBuf;

pub struct FileZoneProvider {
    path: PathBuf,
}

impl FileZoneProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ZoneProvider for FileZoneProvider {
    async fn snapshot(&self) -> Result<Vec<ZoneSnapshot>> {
        let data = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading zones file {}", self.path.display()))?;
        let snapshots: Vec<ZoneSnapshot> = serde_json::from_slice(&data)
            .with_context(|| format!("parsing zones file {}", self.path.display()))?;
        Ok(snapshots)
    }
}
