//! PC MetricsX Core Library
//!
//! Sensor reading model, aggregation, log framing and the source trait
//! shared by the simulator and the server.

pub mod error;
pub mod log_format;
pub mod model;
pub mod source;
pub mod summary;
pub mod units;

pub use error::TelemetryError;
pub use model::{SensorReading, TelemetryWindow};
pub use source::TelemetrySource;
pub use summary::{summarize, TemperatureSummary};
