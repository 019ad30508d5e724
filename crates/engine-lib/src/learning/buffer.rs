//! Bounded per-zone training sample buffer
//!
//! Samples accumulate until the retrain threshold; the full batch is then
//! handed to the trainer and only a sliding window of the newest samples
//! stays behind. Old samples are discarded, not archived: the model
//! should track current-season dynamics, not stale regimes.

use crate::models::TrainingSample;
use std::collections::VecDeque;

/// Accumulated samples that trigger a retrain
pub const RETRAIN_THRESHOLD: usize = 100;

/// Samples retained after a retrain batch is taken
pub const RETAIN_AFTER_RETRAIN: usize = 50;

/// Ring of realized outcomes for one zone
#[derive(Debug)]
pub struct SampleBuffer {
    samples: VecDeque<TrainingSample>,
    threshold: usize,
    retain: usize,
    retrains_triggered: u64,
}

impl SampleBuffer {
    pub fn new(threshold: usize, retain: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(threshold),
            threshold: threshold.max(1),
            retain: retain.min(threshold),
            retrains_triggered: 0,
        }
    }

    /// Append one sample. Returns the full training batch when the
    /// threshold is reached; the buffer is truncated to the most recent
    /// `retain` samples at the same time so the trigger cannot re-fire
    /// off the same data.
    pub fn push(&mut self, sample: TrainingSample) -> Option<Vec<TrainingSample>> {
        self.samples.push_back(sample);
        if self.samples.len() < self.threshold {
            return None;
        }

        let batch: Vec<TrainingSample> = self.samples.iter().cloned().collect();
        while self.samples.len() > self.retain {
            self.samples.pop_front();
        }
        self.retrains_triggered += 1;
        Some(batch)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn retrains_triggered(&self) -> u64 {
        self.retrains_triggered
    }
}
