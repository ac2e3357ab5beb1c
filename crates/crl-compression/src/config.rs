//! Builder-style configuration for [`crate::service::CompressionService`].
//!
//! Follows the same `XConfig`/`XConfigBuilder` split as `crl-buffer`'s
//! `BufferConfig`/`BufferConfigBuilder` (itself grounded on the teacher's
//! `CircuitBreakerConfig`/`CircuitBreakerConfigBuilder`). Defaults are the
//! literal thresholds spec.md §4.2 names for `compress_adaptive`, exposed as
//! tunables per spec.md §9's note that "the precise bandwidth thresholds ...
//! should be exposed as configuration."

/// Configuration for a [`crate::service::CompressionService`].
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    pub(crate) adaptive_none_below_bytes: usize,
    pub(crate) adaptive_none_bandwidth_kbps: f64,
    pub(crate) adaptive_none_small_payload_bytes: usize,
    pub(crate) adaptive_brotli_below_kbps: f64,
    pub(crate) adaptive_gzip_below_kbps: f64,
    pub(crate) none_fallback_ratio_threshold: f64,
}

impl CompressionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CompressionConfigBuilder {
        CompressionConfigBuilder::new()
    }
}

/// Builder for [`CompressionConfig`].
pub struct CompressionConfigBuilder {
    adaptive_none_below_bytes: usize,
    adaptive_none_bandwidth_kbps: f64,
    adaptive_none_small_payload_bytes: usize,
    adaptive_brotli_below_kbps: f64,
    adaptive_gzip_below_kbps: f64,
    none_fallback_ratio_threshold: f64,
}

impl CompressionConfigBuilder {
    /// Creates a new builder with spec.md §4.2's stated defaults.
    pub fn new() -> Self {
        Self {
            adaptive_none_below_bytes: 100,
            adaptive_none_bandwidth_kbps: 1000.0,
            adaptive_none_small_payload_bytes: 10 * 1024,
            adaptive_brotli_below_kbps: 100.0,
            adaptive_gzip_below_kbps: 500.0,
            none_fallback_ratio_threshold: 0.95,
        }
    }

    /// Payloads smaller than this are never compressed.
    ///
    /// Default: 100 bytes.
    pub fn adaptive_none_below_bytes(mut self, bytes: usize) -> Self {
        self.adaptive_none_below_bytes = bytes;
        self
    }

    /// Bandwidth above which small payloads skip compression to save CPU.
    ///
    /// Default: 1000 kbps.
    pub fn adaptive_none_bandwidth_kbps(mut self, kbps: f64) -> Self {
        self.adaptive_none_bandwidth_kbps = kbps;
        self
    }

    /// The "small payload" ceiling paired with `adaptive_none_bandwidth_kbps`.
    ///
    /// Default: 10 KiB.
    pub fn adaptive_none_small_payload_bytes(mut self, bytes: usize) -> Self {
        self.adaptive_none_small_payload_bytes = bytes;
        self
    }

    /// Bandwidth below which `compress_adaptive` picks Brotli (best ratio).
    ///
    /// Default: 100 kbps.
    pub fn adaptive_brotli_below_kbps(mut self, kbps: f64) -> Self {
        self.adaptive_brotli_below_kbps = kbps;
        self
    }

    /// Bandwidth below which `compress_adaptive` picks Gzip.
    ///
    /// Default: 500 kbps.
    pub fn adaptive_gzip_below_kbps(mut self, kbps: f64) -> Self {
        self.adaptive_gzip_below_kbps = kbps;
        self
    }

    /// A compression ratio at or above this (i.e. a gain of 5% or less) is
    /// treated as not worth the CPU; the result falls back to `None`.
    ///
    /// Default: 0.95.
    pub fn none_fallback_ratio_threshold(mut self, ratio: f64) -> Self {
        self.none_fallback_ratio_threshold = ratio;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CompressionConfig {
        CompressionConfig {
            adaptive_none_below_bytes: self.adaptive_none_below_bytes,
            adaptive_none_bandwidth_kbps: self.adaptive_none_bandwidth_kbps,
            adaptive_none_small_payload_bytes: self.adaptive_none_small_payload_bytes,
            adaptive_brotli_below_kbps: self.adaptive_brotli_below_kbps,
            adaptive_gzip_below_kbps: self.adaptive_gzip_below_kbps,
            none_fallback_ratio_threshold: self.none_fallback_ratio_threshold,
        }
    }
}

impl Default for CompressionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfigBuilder::new().build()
    }
}
