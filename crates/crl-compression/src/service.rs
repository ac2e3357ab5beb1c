//! [`CompressionService`]: algorithm selection plus compress/decompress of
//! opaque payloads (spec.md §4.2).

use crate::algorithm::{self, Algorithm};
use crate::config::CompressionConfig;
use crate::network::NetworkConditions;
use crate::stats::CompressionStats;
use crl_core::CrlError;
use std::sync::Mutex;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

/// Result of one `compress`/`compress_adaptive` call (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub data: Vec<u8>,
    pub algorithm: Algorithm,
    pub original_size: usize,
    pub compressed_size: usize,
    /// `compressed_size / original_size`; `1.0` for an empty or `None`-coded
    /// input so it never reads as a "perfect" compression.
    pub ratio: f64,
    pub duration_ms: f64,
}

/// Chooses among compression algorithms and performs compress/decompress,
/// tracking per-algorithm statistics (spec.md §4.2).
///
/// Never increases payload size silently: [`Self::compress`] and
/// [`Self::compress_adaptive`] both fall back to [`Algorithm::None`] when
/// the compressed form isn't smaller (spec.md §4.2, §8's
/// `compressAdaptive(p).compressedSize <= |p|` invariant).
pub struct CompressionService {
    config: CompressionConfig,
    stats: Mutex<CompressionStats>,
    network: NetworkConditions,
}

impl CompressionService {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(CompressionStats::default()),
            network: NetworkConditions::new(),
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// `compress(data, algorithm)` (spec.md §4.2). `Algorithm::None` is
    /// returned unchanged, as the spec directs, without consulting the
    /// ratio fallback (there is nothing to fall back from).
    pub fn compress(&self, data: &[u8], algorithm: Algorithm) -> Result<CompressionResult, CrlError> {
        if matches!(algorithm, Algorithm::None) {
            return Ok(self.record(data.to_vec(), Algorithm::None, data.len(), std::time::Duration::ZERO));
        }

        let effective = if algorithm.is_available() {
            algorithm
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(requested = %algorithm, "algorithm unavailable, falling back to gzip");
            Algorithm::Gzip
        };

        let start = Instant::now();
        let compressed = algorithm::compress_bytes(data, effective).map_err(|e| CrlError::Compression {
            algorithm: effective.as_str(),
            message: e.to_string(),
        })?;
        let duration = start.elapsed();

        if compressed.len() as f64 >= data.len() as f64 * self.config.none_fallback_ratio_threshold {
            return Ok(self.record(data.to_vec(), Algorithm::None, data.len(), duration));
        }

        Ok(self.record(compressed, effective, data.len(), duration))
    }

    /// `compressAdaptive(data)` (spec.md §4.2): chooses an algorithm from
    /// payload size and the last-reported network conditions, then
    /// compresses and applies the same never-larger-than-input fallback as
    /// [`Self::compress`].
    pub fn compress_adaptive(&self, data: &[u8]) -> Result<CompressionResult, CrlError> {
        let algorithm = self.choose_adaptive_algorithm(data.len());
        self.compress(data, algorithm)
    }

    fn choose_adaptive_algorithm(&self, payload_len: usize) -> Algorithm {
        let bandwidth = self.network.bandwidth_kbps();

        if payload_len < self.config.adaptive_none_below_bytes {
            return Algorithm::None;
        }
        if bandwidth >= self.config.adaptive_none_bandwidth_kbps
            && payload_len < self.config.adaptive_none_small_payload_bytes
        {
            return Algorithm::None;
        }
        if bandwidth < self.config.adaptive_brotli_below_kbps {
            return Algorithm::Brotli;
        }
        if bandwidth < self.config.adaptive_gzip_below_kbps {
            return Algorithm::Gzip;
        }
        if Algorithm::Lz4.is_available() {
            Algorithm::Lz4
        } else {
            Algorithm::Gzip
        }
    }

    /// `decompress(data, algorithm)` (spec.md §4.2).
    pub fn decompress(&self, data: &[u8], algorithm: Algorithm) -> Result<Vec<u8>, CrlError> {
        algorithm::decompress_bytes(data, algorithm).map_err(|e| CrlError::Compression {
            algorithm: algorithm.as_str(),
            message: e.to_string(),
        })
    }

    /// `updateNetworkConditions(bandwidthKbps, latencyMs?)` (spec.md §4.2).
    pub fn update_network_conditions(&self, bandwidth_kbps: f64, latency_ms: Option<f64>) {
        self.network.update(bandwidth_kbps, latency_ms);
        #[cfg(feature = "tracing")]
        tracing::debug!(bandwidth_kbps, ?latency_ms, "network conditions updated");
    }

    /// Current bandwidth estimate used by the adaptive chooser.
    pub fn bandwidth_kbps(&self) -> f64 {
        self.network.bandwidth_kbps()
    }

    /// `getStats()` (spec.md §4.2): a snapshot of per-algorithm counters.
    pub fn stats(&self) -> CompressionStats {
        self.stats.lock().unwrap().clone()
    }

    fn record(
        &self,
        data: Vec<u8>,
        algorithm: Algorithm,
        original_size: usize,
        duration: std::time::Duration,
    ) -> CompressionResult {
        let compressed_size = data.len();
        let ratio = if original_size == 0 {
            1.0
        } else {
            compressed_size as f64 / original_size as f64
        };

        self.stats
            .lock()
            .unwrap()
            .record(algorithm, original_size, compressed_size, duration);

        #[cfg(feature = "metrics")]
        {
            counter!("crl_compression_calls_total", "algorithm" => algorithm.as_str()).increment(1);
            histogram!("crl_compression_ratio", "algorithm" => algorithm.as_str()).record(ratio);
        }

        CompressionResult {
            data,
            algorithm,
            original_size,
            compressed_size,
            ratio,
            duration_ms: duration.as_secs_f64() * 1000.0,
        }
    }
}

impl Default for CompressionService {
    fn default() -> Self {
        Self::new(CompressionConfig::default())
    }
}
