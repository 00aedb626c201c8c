//! # History Buffer
//!
//! Fixed-capacity, arrival-ordered store of the most recent telemetry samples.
//! Once full, each append evicts the oldest entry.

use std::collections::VecDeque;

use super::sample::TelemetrySample;

/// Number of samples retained by the dashboard
pub const HISTORY_CAPACITY: usize = 100;

/// Bounded FIFO of telemetry samples (oldest first).
///
/// Owned by the consumer loop. Readers get shared references or clones, so a
/// stored sample is never mutated.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer {
    /// Create a buffer holding [`HISTORY_CAPACITY`] samples.
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create a buffer with a smaller capacity (minimum 1).
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one if the buffer is full.
    pub fn append(&mut self, sample: TelemetrySample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Most recently appended sample, or `None` before any data arrives.
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    /// Up to `k` most recent samples, oldest first.
    pub fn recent(&self, k: usize) -> Vec<TelemetrySample> {
        let skip = self.samples.len().saturating_sub(k);
        self.samples.iter().skip(skip).cloned().collect()
    }

    /// Iterate over all samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
