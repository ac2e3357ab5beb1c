//! `BufferedMessage`, the unit of work held by [`crate::buffer::MessageBuffer`].

use chrono::{DateTime, Utc};
use crl_core::Priority;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-supplied metadata value. Opaque to the buffer (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<MetaValue>),
    Map(HashMap<String, MetaValue>),
}

/// A unit of work held in the [`MessageBuffer`](crate::buffer::MessageBuffer).
///
/// Mirrors spec.md §3's `BufferedMessage` data model: `0 <= retries <=
/// max_retries` is an invariant the buffer enforces on every `add`/`requeue`
/// (see `MessageBuffer::requeue`); `expires_at` and `timestamp` are both
/// wall-clock (`chrono::DateTime<Utc>`) so persisted files round-trip as
/// ISO-8601 text (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub priority: Priority,
    #[serde(with = "serde_bytes_as_base64")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: HashMap<String, MetaValue>,
    pub retries: u32,
    pub max_retries: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BufferedMessage {
    /// Constructs a fresh message the way `MessageBuffer::add` does: a new
    /// id, `retries = 0`, and `timestamp = now`.
    pub fn new(
        topic: impl Into<String>,
        priority: Priority,
        payload: Vec<u8>,
        metadata: HashMap<String, MetaValue>,
        max_retries: u32,
        ttl: Option<chrono::Duration>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            topic: topic.into(),
            priority,
            payload,
            metadata,
            retries: 0,
            max_retries,
            expires_at: ttl.map(|d| now + d),
        }
    }

    /// `size(msg) = |payload| + |topic| + |serialised metadata| + fixed_overhead`
    /// (spec.md §4.1's size-accounting algorithm). The metadata contribution
    /// uses the JSON-serialised length so it tracks what actually hits disk.
    pub fn size_bytes(&self) -> usize {
        const FIXED_OVERHEAD: usize = 128;
        let metadata_len = serde_json::to_vec(&self.metadata)
            .map(|v| v.len())
            .unwrap_or(0);
        self.payload.len() + self.topic.len() + metadata_len + FIXED_OVERHEAD
    }

    /// `true` once `expires_at` has passed, or once `timestamp` is older
    /// than `max_age` (the expiry sweep's two conditions, spec.md §4.1).
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        if let Some(expires_at) = self.expires_at {
            if expires_at < now {
                return true;
            }
        }
        now - self.timestamp > max_age
    }
}

// Payloads are opaque bytes (spec.md §3) and JSON has no native byte-string
// type, so persisted messages carry `payload` as base64 text.
mod serde_bytes_as_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        base64::engine::general_purpose::STANDARD
            .encode(bytes)
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }

}
