//! The unified event stream (spec.md §6).
//!
//! One enum, one [`crate::hub::EventHub`], emitted into by `crl-buffer`,
//! `crl-failover`, and `crl` alike. Minimum set required by spec.md:
//! `messageAdded`, `messageRemoved`, `messageRequeued`, `messageExpired`,
//! `messageDropped{reason}`, `persisted`, `loaded`, `cleared`, `connected`,
//! `disconnected`, `reconnecting`, `maxReconnectReached`, `offline`,
//! `degraded`, `bufferFlushed`, `failover`, `failback`, `circuitOpened`,
//! `circuitClosed`, `healthChanged`.

use crate::events::ResilienceEvent;
use crate::model::{DropReason, EndpointStatus, Priority};
use std::time::Instant;

/// A single CRL-wide event. Every variant carries the `Instant` it occurred
/// at so a listener can reconstruct ordering without a wall clock.
#[derive(Debug, Clone)]
pub enum CrlEvent {
    MessageAdded {
        id: String,
        topic: String,
        priority: Priority,
        at: Instant,
    },
    MessageRemoved {
        id: String,
        at: Instant,
    },
    MessageRequeued {
        id: String,
        retries: u32,
        demoted_to: Priority,
        at: Instant,
    },
    MessageExpired {
        id: String,
        at: Instant,
    },
    MessageDropped {
        id: String,
        reason: DropReason,
        at: Instant,
    },
    Persisted {
        path: String,
        count: usize,
        at: Instant,
    },
    Loaded {
        path: String,
        count: usize,
        at: Instant,
    },
    Cleared {
        at: Instant,
    },
    Connected {
        endpoint_id: Option<String>,
        at: Instant,
    },
    Disconnected {
        endpoint_id: Option<String>,
        at: Instant,
    },
    Reconnecting {
        attempt: u32,
        at: Instant,
    },
    MaxReconnectReached {
        attempts: u32,
        at: Instant,
    },
    Offline {
        at: Instant,
    },
    Degraded {
        bandwidth_kbps: f64,
        at: Instant,
    },
    BufferFlushed {
        count: usize,
        at: Instant,
    },
    Failover {
        group_id: String,
        from: Option<String>,
        to: String,
        reason: String,
        at: Instant,
    },
    Failback {
        group_id: String,
        to: String,
        at: Instant,
    },
    CircuitOpened {
        endpoint_id: String,
        at: Instant,
    },
    CircuitClosed {
        endpoint_id: String,
        at: Instant,
    },
    HealthChanged {
        endpoint_id: String,
        status: EndpointStatus,
        at: Instant,
    },
}

impl ResilienceEvent for CrlEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CrlEvent::MessageAdded { .. } => "message_added",
            CrlEvent::MessageRemoved { .. } => "message_removed",
            CrlEvent::MessageRequeued { .. } => "message_requeued",
            CrlEvent::MessageExpired { .. } => "message_expired",
            CrlEvent::MessageDropped { .. } => "message_dropped",
            CrlEvent::Persisted { .. } => "persisted",
            CrlEvent::Loaded { .. } => "loaded",
            CrlEvent::Cleared { .. } => "cleared",
            CrlEvent::Connected { .. } => "connected",
            CrlEvent::Disconnected { .. } => "disconnected",
            CrlEvent::Reconnecting { .. } => "reconnecting",
            CrlEvent::MaxReconnectReached { .. } => "max_reconnect_reached",
            CrlEvent::Offline { .. } => "offline",
            CrlEvent::Degraded { .. } => "degraded",
            CrlEvent::BufferFlushed { .. } => "buffer_flushed",
            CrlEvent::Failover { .. } => "failover",
            CrlEvent::Failback { .. } => "failback",
            CrlEvent::CircuitOpened { .. } => "circuit_opened",
            CrlEvent::CircuitClosed { .. } => "circuit_closed",
            CrlEvent::HealthChanged { .. } => "health_changed",
        }
    }

    fn timestamp(&self) -> Instant {
        match *self {
            CrlEvent::MessageAdded { at, .. }
            | CrlEvent::MessageRemoved { at, .. }
            | CrlEvent::MessageRequeued { at, .. }
            | CrlEvent::MessageExpired { at, .. }
            | CrlEvent::MessageDropped { at, .. }
            | CrlEvent::Persisted { at, .. }
            | CrlEvent::Loaded { at, .. }
            | CrlEvent::Cleared { at }
            | CrlEvent::Connected { at, .. }
            | CrlEvent::Disconnected { at, .. }
            | CrlEvent::Reconnecting { at, .. }
            | CrlEvent::MaxReconnectReached { at, .. }
            | CrlEvent::Offline { at }
            | CrlEvent::Degraded { at, .. }
            | CrlEvent::BufferFlushed { at, .. }
            | CrlEvent::Failover { at, .. }
            | CrlEvent::Failback { at, .. }
            | CrlEvent::CircuitOpened { at, .. }
            | CrlEvent::CircuitClosed { at, .. }
            | CrlEvent::HealthChanged { at, .. } => at,
        }
    }

    fn pattern_name(&self) -> &str {
        "crl"
    }
}
