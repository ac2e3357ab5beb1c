//! Observed network conditions feeding the adaptive compression chooser
//! (spec.md §4.2 `updateNetworkConditions`).
//!
//! Stored as bit-punned `f64`s in `AtomicU64`s, the same lock-free-snapshot
//! technique the teacher's `tower-resilience-reconnect::state::ReconnectState`
//! uses for its enum state: readers never block a concurrent
//! `update_network_conditions` call.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, lock-free-readable network condition tracker.
pub struct NetworkConditions {
    bandwidth_kbps: AtomicU64,
    latency_ms: AtomicU64,
}

impl NetworkConditions {
    /// Starts with an optimistic assumption (high bandwidth, no latency
    /// data) so a fresh service behaves like `compress_adaptive` was given
    /// ample bandwidth before the first real measurement arrives.
    pub fn new() -> Self {
        Self {
            bandwidth_kbps: AtomicU64::new(f64::MAX.to_bits()),
            latency_ms: AtomicU64::new(0u64),
        }
    }

    pub fn update(&self, bandwidth_kbps: f64, latency_ms: Option<f64>) {
        self.bandwidth_kbps
            .store(bandwidth_kbps.to_bits(), Ordering::Release);
        if let Some(latency_ms) = latency_ms {
            self.latency_ms.store(latency_ms.to_bits(), Ordering::Release);
        }
    }

    pub fn bandwidth_kbps(&self) -> f64 {
        f64::from_bits(self.bandwidth_kbps.load(Ordering::Acquire))
    }

    pub fn latency_ms(&self) -> f64 {
        f64::from_bits(self.latency_ms.load(Ordering::Acquire))
    }
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self::new()
    }
}
