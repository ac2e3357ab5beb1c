//! Connection Resilience Layer: a transport-agnostic middleware that buffers
//! outbound messages across disconnects, compresses them adaptively to
//! current network conditions, and fails over between endpoints, behind one
//! `send` surface (spec.md §1-§2).
//!
//! The layer is built from four independently usable components, each its
//! own crate:
//!
//! - [`crl_buffer`] — priority-ordered, disk-backed outbound message buffer.
//! - [`crl_compression`] — adaptive payload compression.
//! - [`crl_failover`] — endpoint health tracking, circuit breaking, and
//!   failover selection.
//! - This crate — [`ResilienceOrchestrator`], which wires the three together
//!   behind `send`/`sendCommand`/`sendTelemetry` and owns the connection
//!   state machine.
//!
//! # Quick Start
//!
//! ```no_run
//! use crl::{ResilienceOrchestrator, OrchestratorConfig, SendOptions};
//! use crl_buffer::{BufferConfig, MessageBuffer};
//! use crl_compression::{CompressionConfig, CompressionService};
//! use crl_failover::{EndpointDescriptor, FailoverManager};
//! use crl_core::{EventHub, EndpointType};
//!
//! # async fn example() {
//! let events = EventHub::new();
//! let buffer = MessageBuffer::new(BufferConfig::default(), events.clone());
//! let compression = std::sync::Arc::new(CompressionService::new(CompressionConfig::default()));
//! let failover = FailoverManager::new(events.clone());
//!
//! let orchestrator = ResilienceOrchestrator::new(
//!     OrchestratorConfig::default(),
//!     buffer,
//!     compression,
//!     failover,
//!     events,
//! );
//!
//! orchestrator.register_endpoint("primary", "node", "wss://primary.example", Some(EndpointType::Primary), None);
//! orchestrator.initialize(|_endpoint, _bytes| async { Ok(()) });
//!
//! let result = orchestrator.send("orders.created", b"{}".to_vec(), SendOptions::default()).await;
//! assert!(result.success || result.buffered);
//! # }
//! ```

mod config;
mod orchestrator;
mod send;
mod state;

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use orchestrator::{ResilienceOrchestrator, SendFn};
pub use send::{SendOptions, TransmissionResult};
pub use state::{ConnectionState, OrchestratorState};

pub use crl_core as core;
