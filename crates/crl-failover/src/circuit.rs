//! Per-endpoint circuit breaker and health status (spec.md §4.3).
//!
//! A consecutive-failure-count breaker, not the teacher's sliding-window
//! rate-based one (`CircuitState`/`transition_to`/metrics-on-transition kept
//! from `tower-resilience-circuitbreaker/src/circuit.rs`; the window/rate
//! machinery dropped since spec.md ties OPEN to `k2` consecutive failures,
//! not a rate over a window).

use crate::config::HealthCheckConfig;
use crl_core::{CrlEvent, EndpointStatus, EventHub};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Circuit breaker state (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

/// Per-endpoint breaker plus health-status tracking, merged because both
/// key off the same consecutive failure/success counters (spec.md §4.3).
pub(crate) struct EndpointHealth {
    endpoint_id: String,
    state: CircuitState,
    state_atomic: std::sync::Arc<AtomicU8>,
    last_state_change: Instant,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_probe_in_flight: bool,
    status: EndpointStatus,
}

impl EndpointHealth {
    pub(crate) fn new(endpoint_id: String) -> Self {
        Self {
            endpoint_id,
            state: CircuitState::Closed,
            state_atomic: std::sync::Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            last_state_change: Instant::now(),
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_probe_in_flight: false,
            status: EndpointStatus::Unknown,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub(crate) fn status(&self) -> EndpointStatus {
        self.status
    }

    /// Whether this circuit is selectable for a read-only check: CLOSED
    /// always is; OPEN is once `config.open_cooldown` has elapsed since
    /// `last_state_change` (the endpoint is then eligible for the one
    /// HALF_OPEN probe that [`Self::try_acquire`] will actually grant);
    /// HALF_OPEN is only if no probe is already in flight (spec.md §4.3
    /// "status ... AND circuit CLOSED OR (HALF_OPEN AND now ≥
    /// nextProbeAt)").
    pub(crate) fn is_probe_eligible(&self, config: &HealthCheckConfig) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.last_state_change.elapsed() >= config.open_cooldown(),
            CircuitState::HalfOpen => !self.half_open_probe_in_flight,
        }
    }

    /// Whether a call is currently permitted: CLOSED always is, OPEN never
    /// is until `config.open_cooldown` elapses (at which point it moves to
    /// HALF_OPEN and permits exactly one in-flight probe), HALF_OPEN only
    /// permits a call if no probe is already outstanding.
    pub(crate) fn try_acquire(&mut self, config: &HealthCheckConfig) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.open_cooldown() {
                    self.transition_to(CircuitState::HalfOpen);
                    self.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_probe_in_flight {
                    false
                } else {
                    self.half_open_probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// `reportSuccess` (spec.md §4.3): resets the failure streak, and in
    /// HALF_OPEN closes the circuit on the probe's success.
    pub(crate) fn record_success(&mut self, config: &HealthCheckConfig, events: &EventHub<CrlEvent>) {
        self.consecutive_failures = 0;
        self.consecutive_successes += 1;
        self.half_open_probe_in_flight = false;

        match self.state {
            CircuitState::HalfOpen => self.transition_to(CircuitState::Closed),
            _ => {}
        }

        if self.consecutive_successes >= config.success_threshold()
            && matches!(self.status, EndpointStatus::Unknown | EndpointStatus::Unhealthy | EndpointStatus::Degraded)
        {
            self.set_status(EndpointStatus::Healthy, events);
        }
    }

    /// `reportFailure` (spec.md §4.3): `k2` consecutive failures opens the
    /// circuit and marks the endpoint UNHEALTHY; a HALF_OPEN probe failure
    /// reopens immediately.
    pub(crate) fn record_failure(&mut self, config: &HealthCheckConfig, events: &EventHub<CrlEvent>) {
        self.consecutive_successes = 0;
        self.consecutive_failures += 1;
        self.half_open_probe_in_flight = false;

        match self.state {
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open),
            CircuitState::Closed if self.consecutive_failures >= config.failure_threshold() => {
                self.transition_to(CircuitState::Open);
            }
            _ => {}
        }

        if self.consecutive_failures >= config.failure_threshold() {
            self.set_status(EndpointStatus::Unhealthy, events);
        }
    }

    /// Marks DEGRADED independent of the circuit: used when latency EWMA
    /// crosses a threshold while calls are still succeeding.
    pub(crate) fn mark_degraded(&mut self, events: &EventHub<CrlEvent>) {
        if self.status == EndpointStatus::Healthy {
            self.set_status(EndpointStatus::Degraded, events);
        }
    }

    pub(crate) fn mark_offline(&mut self, events: &EventHub<CrlEvent>) {
        self.set_status(EndpointStatus::Offline, events);
    }

    fn set_status(&mut self, status: EndpointStatus, events: &EventHub<CrlEvent>) {
        if self.status == status {
            return;
        }
        self.status = status;
        events.emit(&CrlEvent::HealthChanged {
            endpoint_id: self.endpoint_id.clone(),
            status,
            at: Instant::now(),
        });
    }

    fn transition_to(&mut self, state: CircuitState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();

        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %self.endpoint_id, ?state, "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            let label = match state {
                CircuitState::Closed => "closed",
                CircuitState::Open => "open",
                CircuitState::HalfOpen => "half_open",
            };
            counter!("crl_failover_circuit_transitions_total", "endpoint" => self.endpoint_id.clone(), "to" => label).increment(1);
            gauge!("crl_failover_circuit_state", "endpoint" => self.endpoint_id.clone()).set(state as u8 as f64);
        }
    }

    #[cfg(test)]
    fn force_state(&mut self, state: CircuitState) {
        self.transition_to(state);
    }
}
