//! Telemetry source trait definition

use crate::model::SensorReading;
use anyhow::Result;

/// Something that produces one sensor reading per tick
///
/// The driver only talks to this trait, so a hardware-backed source can
/// replace the simulator without touching the tick loop.
pub trait TelemetrySource: Send + Sync {
    /// Human-readable name of this source (e.g. "Simulator")
    fn name(&self) -> &str;

    /// Start producing readings
    fn start(&mut self) -> Result<()>;

    /// Stop producing readings and release any resources
    fn stop(&mut self) -> Result<()>;

    /// Produce the next reading
    ///
    /// Returns:
    /// - `Ok(Some(reading))` when a reading was produced
    /// - `Ok(None)` when the source is not active
    /// - `Err(_)` if the source failed this tick
    fn read_reading(&mut self) -> Result<Option<SensorReading>>;

    /// Get whether the source is currently active
    fn is_active(&self) -> bool;
}
