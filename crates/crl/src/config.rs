//! Orchestrator-level configuration (spec.md §6 "Configuration").

use std::time::Duration;

/// Top-level orchestrator policy toggles. Buffer, compression, and
/// per-endpoint health-check settings are configured on their own
/// components ([`crl_buffer::BufferConfig`], [`crl_compression::CompressionConfig`],
/// [`crl_failover::HealthCheckConfig`]) and passed to
/// [`crate::ResilienceOrchestrator::new`] separately.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub(crate) auto_reconnect: bool,
    pub(crate) reconnect_interval: Duration,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) buffer_when_offline: bool,
    pub(crate) compress_messages: bool,
    pub(crate) compression_threshold: usize,
    pub(crate) flush_on_reconnect: bool,
    pub(crate) offline_grace_period: Duration,
    pub(crate) degraded_bandwidth_kbps: f64,
}

impl OrchestratorConfig {
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::new()
    }
}

/// Builder for [`OrchestratorConfig`].
pub struct OrchestratorConfigBuilder {
    auto_reconnect: bool,
    reconnect_interval: Duration,
    max_reconnect_attempts: u32,
    buffer_when_offline: bool,
    compress_messages: bool,
    compression_threshold: usize,
    flush_on_reconnect: bool,
    offline_grace_period: Duration,
    degraded_bandwidth_kbps: f64,
}

impl OrchestratorConfigBuilder {
    pub fn new() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: 10,
            buffer_when_offline: true,
            compress_messages: true,
            compression_threshold: 1024,
            flush_on_reconnect: true,
            offline_grace_period: Duration::from_secs(30),
            // spec.md §4.4: "may trigger transition CONNECTED→DEGRADED when
            // bandwidth < 50 kbps"
            degraded_bandwidth_kbps: 50.0,
        }
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn buffer_when_offline(mut self, enabled: bool) -> Self {
        self.buffer_when_offline = enabled;
        self
    }

    pub fn compress_messages(mut self, enabled: bool) -> Self {
        self.compress_messages = enabled;
        self
    }

    pub fn compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    pub fn flush_on_reconnect(mut self, enabled: bool) -> Self {
        self.flush_on_reconnect = enabled;
        self
    }

    pub fn offline_grace_period(mut self, period: Duration) -> Self {
        self.offline_grace_period = period;
        self
    }

    pub fn degraded_bandwidth_kbps(mut self, threshold: f64) -> Self {
        self.degraded_bandwidth_kbps = threshold;
        self
    }

    pub fn build(self) -> OrchestratorConfig {
        OrchestratorConfig {
            auto_reconnect: self.auto_reconnect,
            reconnect_interval: self.reconnect_interval,
            max_reconnect_attempts: self.max_reconnect_attempts,
            buffer_when_offline: self.buffer_when_offline,
            compress_messages: self.compress_messages,
            compression_threshold: self.compression_threshold,
            flush_on_reconnect: self.flush_on_reconnect,
            offline_grace_period: self.offline_grace_period,
            degraded_bandwidth_kbps: self.degraded_bandwidth_kbps,
        }
    }
}

impl Default for OrchestratorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfigBuilder::new().build()
    }
}
