//! Per-algorithm compression statistics (spec.md §4.2 `getStats()`).

use crate::algorithm::Algorithm;
use std::collections::HashMap;
use std::time::Duration;

/// Running totals for one [`Algorithm`], accumulated across every
/// `compress` call that chose it (explicitly or via `compress_adaptive`).
///
/// Monotonically non-decreasing, per spec.md §4.2's invariant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlgorithmStats {
    pub count: u64,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    total_ratio: f64,
    total_duration: Duration,
}

impl AlgorithmStats {
    fn record(&mut self, original_size: usize, compressed_size: usize, duration: Duration) {
        self.count += 1;
        self.original_bytes += original_size as u64;
        self.compressed_bytes += compressed_size as u64;
        let ratio = if original_size == 0 {
            1.0
        } else {
            compressed_size as f64 / original_size as f64
        };
        self.total_ratio += ratio;
        self.total_duration += duration;
    }

    /// Mean `compressed_size / original_size` across every recorded call.
    pub fn mean_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ratio / self.count as f64
        }
    }

    /// Mean wall-clock time spent compressing, across every recorded call.
    pub fn mean_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

/// Snapshot of [`crate::service::CompressionService::stats`]: one
/// [`AlgorithmStats`] per algorithm that has been used at least once.
#[derive(Debug, Clone, Default)]
pub struct CompressionStats {
    pub(crate) per_algorithm: HashMap<Algorithm, AlgorithmStats>,
}

impl CompressionStats {
    pub(crate) fn record(
        &mut self,
        algorithm: Algorithm,
        original_size: usize,
        compressed_size: usize,
        duration: Duration,
    ) {
        self.per_algorithm
            .entry(algorithm)
            .or_default()
            .record(original_size, compressed_size, duration);
    }

    /// Stats for one algorithm, if it has ever been used.
    pub fn get(&self, algorithm: Algorithm) -> Option<&AlgorithmStats> {
        self.per_algorithm.get(&algorithm)
    }

    /// Every algorithm with recorded usage.
    pub fn algorithms(&self) -> impl Iterator<Item = (&Algorithm, &AlgorithmStats)> {
        self.per_algorithm.iter()
    }
}
