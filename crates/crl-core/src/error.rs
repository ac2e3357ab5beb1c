//! The Connection Resilience Layer's shared infrastructure error type.
//!
//! Narrower than the teacher's `ResilienceError<E>`: spec.md §7 requires
//! that no error ever escape `send`/`sendCommand`/`sendTelemetry` as an
//! exception — outcomes are encoded in `TransmissionResult` instead. So
//! `CrlError` only needs to cover the closed set of *infrastructure*
//! failures (serialization, I/O, misuse) that the buffer, failover manager,
//! and orchestrator's fallible setup/maintenance operations can raise.
use thiserror::Error;

/// Infrastructure failure shared across every CRL crate.
#[derive(Debug, Error)]
pub enum CrlError {
    /// `send` was called before `initialize(send_fn)` registered a
    /// transport callback (spec.md §4.4).
    #[error("orchestrator not initialised: no transport callback registered")]
    NotInitialised,

    /// `requeue` was called with a message still resident in the buffer
    /// (spec.md §9 open question: treated as an error, not a silent
    /// double-insert).
    #[error("message {0:?} is still resident in the buffer")]
    AlreadyBuffered(String),

    /// A lookup by id or group id found nothing.
    #[error("no such {kind} with id {id:?}")]
    NotFound { kind: &'static str, id: String },

    /// `executeWithFailover` exhausted every endpoint in the group without
    /// a success (spec.md §4.3).
    #[error("all endpoints in group {group_id:?} exhausted after {attempts} attempt(s)")]
    EndpointsExhausted { group_id: String, attempts: u32 },

    /// Serializing/deserializing persisted buffer contents failed.
    #[error("(de)serialization failed: {0}")]
    Serialization(String),

    /// A spill-file or spill-directory I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A compression/decompression codec failed.
    #[error("compression error ({algorithm}): {message}")]
    Compression {
        algorithm: &'static str,
        message: String,
    },
}

/// Convenience alias used throughout the workspace.
pub type CrlResult<T> = Result<T, CrlError>;
