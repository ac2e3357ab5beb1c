//! Group-scoped selection and retry policy (spec.md §4.3).

use crl_backoff::{ExponentialBackoff, IntervalFunction};
use std::time::Duration;

/// Endpoint selection mode for a [`crate::group::FailoverGroup`] (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Lowest-`priority` healthy endpoint; PRIMARY preferred.
    ActivePassive,
    /// Next healthy endpoint in a cyclic index.
    RoundRobin,
    /// Healthy endpoint with smallest observed latency, ties broken by priority.
    LeastLatency,
    /// Healthy endpoint with smallest `inflight/weight` ratio (weight from priority).
    LoadWeighted,
    /// Caller-driven: returns the first healthy endpoint; load distribution
    /// among "active" endpoints is the caller's concern.
    ActiveActive,
}

/// Per-group selection and retry policy (spec.md §4.3, §A.2 `FailoverPolicy`).
#[derive(Debug, Clone)]
pub struct FailoverPolicy {
    pub mode: SelectionMode,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub retry_backoff_multiplier: f64,
    pub retry_backoff_cap: Duration,
    pub failback_enabled: bool,
    pub failback_stability: Duration,
}

impl FailoverPolicy {
    pub fn builder() -> FailoverPolicyBuilder {
        FailoverPolicyBuilder::new()
    }

    /// `delay(attempt) = min(retryBackoffCapMs, retryBackoffMs * multiplier^attempt)`
    /// (spec.md §4.3 "Backoff"), delegated to the same `ExponentialBackoff`
    /// the reconnect loop uses so both layers share one growth curve.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        ExponentialBackoff::new(self.retry_backoff)
            .multiplier(self.retry_backoff_multiplier)
            .max_interval(self.retry_backoff_cap)
            .next_interval(attempt as usize)
    }
}

/// Builder for [`FailoverPolicy`].
pub struct FailoverPolicyBuilder {
    mode: SelectionMode,
    max_retries: u32,
    retry_backoff: Duration,
    retry_backoff_multiplier: f64,
    retry_backoff_cap: Duration,
    failback_enabled: bool,
    failback_stability: Duration,
}

impl FailoverPolicyBuilder {
    pub fn new() -> Self {
        Self {
            mode: SelectionMode::ActivePassive,
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            retry_backoff_multiplier: 2.0,
            retry_backoff_cap: Duration::from_secs(10),
            // Opt-in per spec.md §9 open question: failback defaults off to
            // avoid thrashing between endpoints.
            failback_enabled: false,
            failback_stability: Duration::from_secs(60),
        }
    }

    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn retry_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.retry_backoff_multiplier = multiplier;
        self
    }

    pub fn retry_backoff_cap(mut self, cap: Duration) -> Self {
        self.retry_backoff_cap = cap;
        self
    }

    pub fn failback_enabled(mut self, enabled: bool) -> Self {
        self.failback_enabled = enabled;
        self
    }

    pub fn failback_stability(mut self, stability: Duration) -> Self {
        self.failback_stability = stability;
        self
    }

    pub fn build(self) -> FailoverPolicy {
        FailoverPolicy {
            mode: self.mode,
            max_retries: self.max_retries,
            retry_backoff: self.retry_backoff,
            retry_backoff_multiplier: self.retry_backoff_multiplier,
            retry_backoff_cap: self.retry_backoff_cap,
            failback_enabled: self.failback_enabled,
            failback_stability: self.failback_stability,
        }
    }
}

impl Default for FailoverPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        FailoverPolicyBuilder::new().build()
    }
}
