//! Sensor data model
//!
//! Defines the SensorReading record produced once per simulation tick, the
//! bounded in-memory window of recent readings, and the fan-curve
//! recommendation handed to the dashboard.
//!
//! The JSON shape of `SensorReading` is the on-disk log format and the
//! publish payload, so field names are part of the external interface.

use crate::summary::TemperatureSummary;
use crate::units::Celsius;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Temperature-sensing components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Cpu,
    Gpu,
    Ssd,
    Motherboard,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Cpu,
        Component::Gpu,
        Component::Ssd,
        Component::Motherboard,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Component::Cpu => "cpu",
            Component::Gpu => "gpu",
            Component::Ssd => "ssd",
            Component::Motherboard => "motherboard",
        }
    }
}

/// Speed-controlled fans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fan {
    CpuFan,
    GpuFan,
    CaseFan,
}

impl Fan {
    pub const ALL: [Fan; 3] = [Fan::CpuFan, Fan::GpuFan, Fan::CaseFan];

    pub fn key(&self) -> &'static str {
        match self {
            Fan::CpuFan => "cpu_fan",
            Fan::GpuFan => "gpu_fan",
            Fan::CaseFan => "case_fan",
        }
    }
}

/// One snapshot of every sensor, produced once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Unix timestamp in seconds
    pub timestamp: i64,

    /// Identifier of the reporting machine
    pub device_id: String,

    // === Temperatures ===
    pub cpu_temp: Celsius,
    pub gpu_temp: Celsius,
    pub ssd_temp: Celsius,
    pub motherboard_temp: Celsius,

    // === Fans ===
    pub cpu_fan_rpm: u32,
    pub gpu_fan_rpm: u32,
    pub case_fan_rpm: u32,

    // === Workload ===
    /// Whether a gaming session is in progress
    pub gaming_session: bool,

    /// Instantaneous workload, 0.0 (idle) to 1.0 (max)
    pub gaming_intensity: f64,
}

impl SensorReading {
    pub fn temperature(&self, component: Component) -> Celsius {
        match component {
            Component::Cpu => self.cpu_temp,
            Component::Gpu => self.gpu_temp,
            Component::Ssd => self.ssd_temp,
            Component::Motherboard => self.motherboard_temp,
        }
    }

    pub fn fan_rpm(&self, fan: Fan) -> u32 {
        match fan {
            Fan::CpuFan => self.cpu_fan_rpm,
            Fan::GpuFan => self.gpu_fan_rpm,
            Fan::CaseFan => self.case_fan_rpm,
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Bounded chronological window of recent readings
///
/// Insertion order is chronological order. Once `capacity` is reached the
/// oldest reading is evicted.
#[derive(Debug, Clone)]
pub struct TelemetryWindow {
    readings: VecDeque<SensorReading>,
    capacity: usize,
}

impl TelemetryWindow {
    /// Retention used by the dashboard
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, reading: SensorReading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn extend<I: IntoIterator<Item = SensorReading>>(&mut self, readings: I) {
        for reading in readings {
            self.push(reading);
        }
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.readings.back()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Readings with `timestamp >= cutoff`
    pub fn since(&self, cutoff: i64) -> Vec<SensorReading> {
        self.readings
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Readings from the last `minutes` minutes before `now`
    pub fn recent_minutes(&self, now: i64, minutes: u32) -> Vec<SensorReading> {
        self.since(now - i64::from(minutes) * 60)
    }

    /// The most recent `n` readings, oldest first
    pub fn last_n(&self, n: usize) -> Vec<SensorReading> {
        let skip = self.readings.len().saturating_sub(n);
        self.readings.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.readings.iter()
    }
}

impl Default for TelemetryWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// User preference steering the fan-curve recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    #[default]
    Balanced,
    BestTemps,
    MostQuiet,
}

impl Preference {
    pub const ALL: [Preference; 3] = [
        Preference::Balanced,
        Preference::BestTemps,
        Preference::MostQuiet,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Preference::Balanced => "balanced",
            Preference::BestTemps => "best_temps",
            Preference::MostQuiet => "most_quiet",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Preference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Preference::ALL
            .into_iter()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| format!("unknown preference '{}'", s))
    }
}

/// Temperatures (°C) at which CPU fan setpoints apply
pub const CPU_CURVE_BREAKPOINTS: [f64; 5] = [30.0, 50.0, 70.0, 85.0, 95.0];

/// Temperatures (°C) at which GPU and case fan setpoints apply
pub const GPU_CURVE_BREAKPOINTS: [f64; 5] = [30.0, 50.0, 70.0, 85.0, 90.0];

/// Five RPM setpoints per fan, one per breakpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanCurves {
    pub cpu_fan: [u32; 5],
    pub gpu_fan: [u32; 5],
    pub case_fan: [u32; 5],
}

impl FanCurves {
    pub fn curve(&self, fan: Fan) -> &[u32; 5] {
        match fan {
            Fan::CpuFan => &self.cpu_fan,
            Fan::GpuFan => &self.gpu_fan,
            Fan::CaseFan => &self.case_fan,
        }
    }

    pub fn breakpoints(fan: Fan) -> &'static [f64; 5] {
        match fan {
            Fan::CpuFan => &CPU_CURVE_BREAKPOINTS,
            Fan::GpuFan | Fan::CaseFan => &GPU_CURVE_BREAKPOINTS,
        }
    }
}

/// Where a recommendation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Remote,
    Local,
}

/// Recommended fan curves for a preference, with the summary they were based on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanCurveRecommendation {
    pub preference: Preference,
    pub fan_curves: FanCurves,
    pub summary: TemperatureSummary,
    /// Free-form remarks keyed by topic (e.g. "cpu", "efficiency")
    pub notes: BTreeMap<String, String>,
    pub generated_at: DateTime<Utc>,
    pub source: RecommendationSource,
}

#[cfg(test)]
pub(crate) fn sample_reading(timestamp: i64, cpu: f64, gaming: bool) -> SensorReading {
    SensorReading {
        timestamp,
        device_id: "GamingPC4".to_string(),
        cpu_temp: Celsius(cpu),
        gpu_temp: Celsius(cpu - 3.0),
        ssd_temp: Celsius(38.5),
        motherboard_temp: Celsius(35.2),
        cpu_fan_rpm: 1450,
        gpu_fan_rpm: 1200,
        case_fan_rpm: 900,
        gaming_session: gaming,
        gaming_intensity: if gaming { 0.8 } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_json_field_names() {
        let reading = sample_reading(1_750_263_292, 45.2, false);
        let json = serde_json::to_value(&reading).unwrap();

        for key in [
            "timestamp",
            "device_id",
            "cpu_temp",
            "gpu_temp",
            "ssd_temp",
            "motherboard_temp",
            "cpu_fan_rpm",
            "gpu_fan_rpm",
            "case_fan_rpm",
            "gaming_session",
            "gaming_intensity",
        ] {
            assert!(json.get(key).is_some(), "missing field {}", key);
        }
        assert_eq!(json["cpu_temp"], 45.2);
        assert_eq!(json["cpu_fan_rpm"], 1450);
    }

    #[test]
    fn test_reading_parses_source_log_record() {
        let raw = r#"{
            "timestamp": 1750263292,
            "device_id": "GamingPC4",
            "cpu_temp": 45.2,
            "gpu_temp": 42.1,
            "ssd_temp": 38.5,
            "motherboard_temp": 35.2,
            "cpu_fan_rpm": 1450,
            "gpu_fan_rpm": 1200,
            "case_fan_rpm": 900,
            "gaming_session": false,
            "gaming_intensity": 0.0
        }"#;
        let reading: SensorReading = serde_json::from_str(raw).unwrap();
        assert_eq!(reading.temperature(Component::Gpu), Celsius(42.1));
        assert_eq!(reading.fan_rpm(Fan::CaseFan), 900);
        assert!(reading.datetime().is_some());
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = TelemetryWindow::new(3);
        for ts in 0..5 {
            window.push(sample_reading(ts, 40.0, false));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().next().unwrap().timestamp, 2);
        assert_eq!(window.latest().unwrap().timestamp, 4);
    }

    #[test]
    fn test_window_recent_minutes() {
        let mut window = TelemetryWindow::default();
        window.extend((0..10).map(|i| sample_reading(i * 60, 40.0, false)));

        // now = 540, 3 minutes back => cutoff 360
        let recent = window.recent_minutes(540, 3);
        let stamps: Vec<i64> = recent.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![360, 420, 480, 540]);
    }

    #[test]
    fn test_window_last_n() {
        let mut window = TelemetryWindow::default();
        window.extend((0..5).map(|i| sample_reading(i, 40.0, false)));
        let tail = window.last_n(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].timestamp, 3);
        assert_eq!(window.last_n(100).len(), 5);
    }

    #[test]
    fn test_preference_from_str() {
        assert_eq!("best_temps".parse::<Preference>(), Ok(Preference::BestTemps));
        assert_eq!(" Most_Quiet ".parse::<Preference>(), Ok(Preference::MostQuiet));
        assert!("loud".parse::<Preference>().is_err());
    }

    #[test]
    fn test_preference_serialization() {
        let json = serde_json::to_string(&Preference::MostQuiet).unwrap();
        assert_eq!(json, "\"most_quiet\"");
    }

    #[test]
    fn test_fan_curve_breakpoints() {
        assert_eq!(FanCurves::breakpoints(Fan::CpuFan)[4], 95.0);
        assert_eq!(FanCurves::breakpoints(Fan::CaseFan)[4], 90.0);
    }
}
