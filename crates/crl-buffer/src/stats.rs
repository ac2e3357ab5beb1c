//! `BufferStats`, returned by `MessageBuffer::stats()`.
//!
//! spec.md §4.1 names `getStats()` but leaves its shape unspecified; this
//! is the supplement described in SPEC_FULL.md's C1 section.

/// Point-in-time snapshot of a [`crate::buffer::MessageBuffer`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Number of messages currently resident in memory.
    pub size: usize,
    /// Total bytes currently accounted for (`memorySize`, spec.md §4.1).
    pub memory_size: usize,
    /// Lifetime count of `add` calls that succeeded.
    pub total_added: u64,
    /// Lifetime count of messages removed via `pop`/`remove`.
    pub total_removed: u64,
    /// Lifetime count of messages dropped (any reason).
    pub total_dropped: u64,
    /// Lifetime count of messages removed by the expiry sweep.
    pub total_expired: u64,
    /// Lifetime count of successful `requeue` calls.
    pub total_requeued: u64,
}
