//! Error kinds shared across the workspace
//!
//! Only configuration problems are fatal. Everything here is recovered
//! locally by the caller: skipped, logged, or replaced by a fallback.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// One record in the sensor log could not be parsed
    #[error("malformed log entry #{index}: {reason}")]
    MalformedLogEntry { index: usize, reason: String },

    /// Aggregation was requested over zero readings
    #[error("insufficient data: no readings to aggregate")]
    EmptyInput,

    /// A sink could not accept a reading this tick
    #[error("sink '{sink}' unavailable: {reason}")]
    SinkUnavailable { sink: String, reason: String },

    /// The remote advisory path failed; callers substitute the local policy
    #[error("advisory channel unavailable: {0}")]
    AdvisoryUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
