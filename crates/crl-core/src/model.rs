//! Shared data-model vocabulary used by every Connection Resilience Layer crate.
//!
//! Kept here (rather than in `crl-buffer`/`crl-failover`) so both can depend
//! on the same types without a dependency cycle back through `crl-core`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Message priority, ordered highest-to-lowest exactly as spec'd:
/// `CRITICAL > HIGH > NORMAL > LOW > BATCH`.
///
/// Derives `Ord` from declaration order, so `Priority::Critical < Priority::Batch`
/// holds (lower discriminant = higher priority), matching the "lower number
/// wins" convention used for `ConnectionEndpoint::priority` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Batch,
}

impl Priority {
    /// One step down the priority ladder, floored at `Batch`.
    ///
    /// Used by `MessageBuffer::requeue`'s demotion rule (spec.md §4.1).
    pub fn demote(self) -> Priority {
        match self {
            Priority::Critical => Priority::High,
            Priority::High => Priority::Normal,
            Priority::Normal => Priority::Low,
            Priority::Low => Priority::Batch,
            Priority::Batch => Priority::Batch,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Batch => "batch",
        };
        f.write_str(s)
    }
}

/// Reason a message was dropped from the buffer, surfaced on the
/// `messageDropped{reason}` event (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `makeRoom` evicted a lower-priority tail resident.
    BufferFull,
    /// `requeue` would have pushed `retries` past `maxRetries`.
    MaxRetries,
    /// The message alone exceeds `maxMemorySize`.
    TooLarge,
    /// The expiry sweep found `expiresAt` or `maxMessageAge` exceeded.
    Expired,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DropReason::BufferFull => "buffer_full",
            DropReason::MaxRetries => "max_retries",
            DropReason::TooLarge => "too_large",
            DropReason::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Endpoint role, used only to pick the default selection `priority`
/// (spec.md §3: `PRIMARY=0, SECONDARY=1, ...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    Primary,
    Secondary,
    Tertiary,
    Backup,
}

impl EndpointType {
    /// Default numeric priority for this endpoint type (lower = preferred).
    pub fn default_priority(self) -> i32 {
        match self {
            EndpointType::Primary => 0,
            EndpointType::Secondary => 1,
            EndpointType::Tertiary => 2,
            EndpointType::Backup => 3,
        }
    }
}

/// Observed health of an endpoint, independent of its circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
}

impl EndpointStatus {
    /// An endpoint is selectable when healthy or merely degraded; its
    /// circuit breaker state is the other half of the "is this endpoint
    /// usable" question (spec.md §4.3).
    pub fn is_selectable(self) -> bool {
        matches!(self, EndpointStatus::Healthy | EndpointStatus::Degraded)
    }
}
