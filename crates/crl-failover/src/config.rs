//! Per-endpoint health-check configuration and the probe method vocabulary
//! (spec.md §3 `ConnectionEndpoint.healthCheck`).
//!
//! Builder style kept from the teacher's `CircuitBreakerConfigBuilder`.

use std::time::Duration;

/// How a health probe reaches an endpoint. CRL never performs the wire
/// check itself (the transport is an external collaborator per spec.md
/// §1); this only labels which kind of probe a caller's
/// [`crate::health::EndpointProbe`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Tcp,
    Http,
    Ws,
    Ping,
}

/// Per-endpoint health-check configuration (spec.md §3, §4.3).
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub(crate) enabled: bool,
    pub(crate) interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) success_threshold: u32,
    pub(crate) failure_threshold: u32,
    pub(crate) method: ProbeMethod,
    pub(crate) open_cooldown: Duration,
}

impl HealthCheckConfig {
    pub fn builder() -> HealthCheckConfigBuilder {
        HealthCheckConfigBuilder::new()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    pub fn open_cooldown(&self) -> Duration {
        self.open_cooldown
    }

    pub fn method(&self) -> ProbeMethod {
        self.method
    }
}

/// Builder for [`HealthCheckConfig`].
pub struct HealthCheckConfigBuilder {
    enabled: bool,
    interval: Duration,
    timeout: Duration,
    success_threshold: u32,
    failure_threshold: u32,
    method: ProbeMethod,
    open_cooldown: Duration,
}

impl HealthCheckConfigBuilder {
    pub fn new() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
            success_threshold: 2,
            failure_threshold: 3,
            method: ProbeMethod::Tcp,
            open_cooldown: Duration::from_secs(30),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Consecutive probe/report successes (k1) before status moves toward
    /// HEALTHY.
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Consecutive probe/report failures (k2) before status becomes
    /// UNHEALTHY and the circuit opens.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn method(mut self, method: ProbeMethod) -> Self {
        self.method = method;
        self
    }

    /// How long the circuit stays OPEN before allowing a HALF_OPEN probe.
    ///
    /// Default: 30 seconds (spec.md §4.3).
    pub fn open_cooldown(mut self, cooldown: Duration) -> Self {
        self.open_cooldown = cooldown;
        self
    }

    pub fn build(self) -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: self.enabled,
            interval: self.interval,
            timeout: self.timeout,
            success_threshold: self.success_threshold,
            failure_threshold: self.failure_threshold,
            method: self.method,
            open_cooldown: self.open_cooldown,
        }
    }
}

impl Default for HealthCheckConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        HealthCheckConfigBuilder::new().build()
    }
}
