//! The orchestrator's connection-state machine (spec.md §4.4).
//!
//! Atomic-encoded the same way the teacher's
//! `tower-resilience-reconnect::state::ReconnectState` encodes its 3-variant
//! `ConnectionState`, generalized here to the 5 states spec.md requires:
//! `Connected/Disconnected/Reconnecting/Degraded/Offline`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Connection lifecycle state (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connected = 1,
    Reconnecting = 2,
    Degraded = 3,
    Offline = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Reconnecting,
            3 => ConnectionState::Degraded,
            4 => ConnectionState::Offline,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Shared, lock-free-readable connection state, reconnect attempt counter,
/// and last-connected timestamp (spec.md §4.4).
pub struct OrchestratorState {
    state: AtomicU8Wrapper,
    attempts: AtomicU32,
    last_connected_millis: AtomicU64,
    started_at: Instant,
}

// Kept as a thin wrapper (rather than a bare `AtomicU8` field) so
// `ConnectionState`'s `Ordering` usage reads the same way at every call site
// as the teacher's `ReconnectState`.
struct AtomicU8Wrapper(std::sync::atomic::AtomicU8);

impl OrchestratorState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8Wrapper(std::sync::atomic::AtomicU8::new(ConnectionState::Disconnected as u8)),
            attempts: AtomicU32::new(0),
            last_connected_millis: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.0.load(Ordering::Acquire))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn mark_connected(&self) {
        self.state.0.store(ConnectionState::Connected as u8, Ordering::Release);
        self.attempts.store(0, Ordering::Release);
        self.last_connected_millis
            .store(self.started_at.elapsed().as_millis() as u64, Ordering::Release);
    }

    pub fn mark_disconnected(&self) {
        self.state
            .0
            .store(ConnectionState::Disconnected as u8, Ordering::Release);
    }

    pub fn mark_reconnecting(&self) {
        self.state
            .0
            .store(ConnectionState::Reconnecting as u8, Ordering::Release);
    }

    pub fn mark_degraded(&self) {
        self.state.0.store(ConnectionState::Degraded as u8, Ordering::Release);
    }

    pub fn mark_offline(&self) {
        self.state.0.store(ConnectionState::Offline as u8, Ordering::Release);
    }

    pub fn increment_attempts(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    pub fn time_since_connected(&self) -> Option<Duration> {
        let millis = self.last_connected_millis.load(Ordering::Acquire);
        if millis == 0 {
            None
        } else {
            Some(self.started_at.elapsed().saturating_sub(Duration::from_millis(millis)))
        }
    }
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::new()
    }
}
