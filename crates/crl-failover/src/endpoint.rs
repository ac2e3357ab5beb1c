//! Endpoint registration types (spec.md §3 `ConnectionEndpoint`).

use crate::config::HealthCheckConfig;
use crl_core::{EndpointStatus, EndpointType};
use std::time::Instant;

/// Static identity and configuration of a registered endpoint.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub id: String,
    pub address: String,
    pub endpoint_type: EndpointType,
    pub priority: i32,
    pub health_check: HealthCheckConfig,
}

impl EndpointDescriptor {
    pub fn new(id: impl Into<String>, address: impl Into<String>, endpoint_type: EndpointType) -> Self {
        let priority = endpoint_type.default_priority();
        Self {
            id: id.into(),
            address: address.into(),
            endpoint_type,
            priority,
            health_check: HealthCheckConfig::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_check = config;
        self
    }
}

/// Latency sample exponential moving average used for DEGRADED detection
/// (spec.md §4.3: "an endpoint is DEGRADED when its EWMA latency exceeds
/// a configurable threshold even while still succeeding").
#[derive(Debug, Clone, Copy)]
pub(crate) struct LatencyEwma {
    value_ms: Option<f64>,
    alpha: f64,
}

impl LatencyEwma {
    pub(crate) fn new(alpha: f64) -> Self {
        Self { value_ms: None, alpha }
    }

    pub(crate) fn record(&mut self, sample_ms: f64) {
        self.value_ms = Some(match self.value_ms {
            Some(prev) => self.alpha * sample_ms + (1.0 - self.alpha) * prev,
            None => sample_ms,
        });
    }

    pub(crate) fn value_ms(&self) -> Option<f64> {
        self.value_ms
    }
}

impl Default for LatencyEwma {
    fn default() -> Self {
        Self::new(0.2)
    }
}

/// Mutable runtime state tracked per endpoint: current status, circuit,
/// counters, and the instant of the last status change.
pub struct EndpointRuntime {
    pub descriptor: EndpointDescriptor,
    pub(crate) status: EndpointStatus,
    pub(crate) last_status_change: Instant,
    pub(crate) consecutive_failures: u32,
    pub(crate) consecutive_successes: u32,
    pub(crate) latency: LatencyEwma,
    pub(crate) total_successes: u64,
    pub(crate) total_failures: u64,
}

impl EndpointRuntime {
    pub fn new(descriptor: EndpointDescriptor) -> Self {
        Self {
            descriptor,
            status: EndpointStatus::Unknown,
            last_status_change: Instant::now(),
            consecutive_failures: 0,
            consecutive_successes: 0,
            latency: LatencyEwma::default(),
            total_successes: 0,
            total_failures: 0,
        }
    }

    pub fn status(&self) -> EndpointStatus {
        self.status
    }

    /// Updates status, resetting `last_status_change` only when it actually
    /// changes (used by failback's "continuously healthy" check).
    pub(crate) fn set_status(&mut self, status: EndpointStatus) {
        if self.status != status {
            self.status = status;
            self.last_status_change = Instant::now();
        }
    }

    pub fn latency_ewma_ms(&self) -> Option<f64> {
        self.latency.value_ms()
    }
}
