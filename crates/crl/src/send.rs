//! `send`/`sendCommand`/`sendTelemetry` request/response types (spec.md §4.4).

use crl_core::Priority;
use std::collections::HashMap;
use std::time::Duration;

/// Options accepted by [`crate::ResilienceOrchestrator::send`].
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub priority: Option<Priority>,
    pub group_id: Option<String>,
    pub max_retries: Option<u32>,
    pub expires_in: Option<Duration>,
    pub metadata: HashMap<String, crl_buffer::MetaValue>,
}

/// Result of a `send`/`sendCommand`/`sendTelemetry` call (spec.md §4.4).
///
/// Errors never escape as exceptions (spec.md §7): every outcome, including
/// transport failure, is encoded here.
#[derive(Debug, Clone)]
pub struct TransmissionResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub buffered: bool,
    pub compressed: bool,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

impl TransmissionResult {
    pub(crate) fn sent(message_id: String, compressed: bool, latency_ms: f64) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            buffered: false,
            compressed,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub(crate) fn buffered(message_id: String) -> Self {
        Self {
            success: false,
            message_id: Some(message_id),
            buffered: true,
            compressed: false,
            latency_ms: None,
            error: None,
        }
    }

    pub(crate) fn dropped(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            buffered: false,
            compressed: false,
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    pub(crate) fn not_initialised() -> Self {
        Self::dropped("not initialised")
    }
}
