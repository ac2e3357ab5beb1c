//! Builder-style configuration for [`crate::buffer::MessageBuffer`].
//!
//! Follows the same `XConfig`/`XConfigBuilder` split as
//! `CircuitBreakerConfig`/`CircuitBreakerConfigBuilder`
//! (`tower-resilience-circuitbreaker/src/config.rs`).
use std::time::Duration;

/// Configuration for a [`crate::buffer::MessageBuffer`].
#[derive(Debug, Clone)]
pub struct BufferConfig {
    pub(crate) max_memory_size: usize,
    pub(crate) max_disk_size: usize,
    pub(crate) persist_path: std::path::PathBuf,
    pub(crate) compress_on_persist: bool,
    pub(crate) max_message_age: chrono::Duration,
    pub(crate) flush_interval: Duration,
    pub(crate) expiry_sweep_interval: Duration,
}

impl BufferConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BufferConfigBuilder {
        BufferConfigBuilder::new()
    }

    pub fn max_memory_size(&self) -> usize {
        self.max_memory_size
    }

    pub fn persist_path(&self) -> &std::path::Path {
        &self.persist_path
    }
}

/// Builder for [`BufferConfig`].
pub struct BufferConfigBuilder {
    max_memory_size: usize,
    max_disk_size: usize,
    persist_path: std::path::PathBuf,
    compress_on_persist: bool,
    max_message_age: chrono::Duration,
    flush_interval: Duration,
    expiry_sweep_interval: Duration,
}

const DEFAULT_MAX_MEMORY_SIZE: usize = 50 * 1024 * 1024;
const DEFAULT_MAX_DISK_SIZE: usize = 100 * 1024 * 1024;

impl BufferConfigBuilder {
    /// Creates a new builder with spec.md §6's stated defaults.
    pub fn new() -> Self {
        Self {
            max_memory_size: DEFAULT_MAX_MEMORY_SIZE,
            max_disk_size: DEFAULT_MAX_DISK_SIZE,
            persist_path: std::path::PathBuf::from("./crl-buffer-spill"),
            compress_on_persist: true,
            max_message_age: chrono::Duration::hours(24),
            flush_interval: Duration::from_secs(30),
            expiry_sweep_interval: Duration::from_secs(60),
        }
    }

    /// Buffer memory cap in bytes.
    ///
    /// Default: 50 MiB.
    pub fn max_memory_size(mut self, bytes: usize) -> Self {
        self.max_memory_size = bytes;
        self
    }

    /// Spill directory cap in bytes.
    ///
    /// Default: 100 MiB.
    pub fn max_disk_size(mut self, bytes: usize) -> Self {
        self.max_disk_size = bytes;
        self
    }

    /// Directory persisted spill files are written to.
    pub fn persist_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.persist_path = path.into();
        self
    }

    /// Gzip spill files.
    ///
    /// Default: true.
    pub fn compress_on_persist(mut self, enabled: bool) -> Self {
        self.compress_on_persist = enabled;
        self
    }

    /// Max age before the expiry sweep removes a message.
    ///
    /// Default: 24 hours.
    pub fn max_message_age(mut self, age: chrono::Duration) -> Self {
        self.max_message_age = age;
        self
    }

    /// Auto-persist-on-pressure check cadence.
    ///
    /// Default: 30 seconds.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Cadence of the expiry sweep / disk-file pruning tick.
    ///
    /// Default: 60 seconds (spec.md §4.1).
    pub fn expiry_sweep_interval(mut self, interval: Duration) -> Self {
        self.expiry_sweep_interval = interval;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BufferConfig {
        BufferConfig {
            max_memory_size: self.max_memory_size,
            max_disk_size: self.max_disk_size,
            persist_path: self.persist_path,
            compress_on_persist: self.compress_on_persist,
            max_message_age: self.max_message_age,
            flush_interval: self.flush_interval,
            expiry_sweep_interval: self.expiry_sweep_interval,
        }
    }
}

impl Default for BufferConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfigBuilder::new().build()
    }
}
