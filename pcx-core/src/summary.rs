//! Telemetry aggregation
//!
//! Turns a window of readings into the statistical summary consumed by the
//! fan-curve recommender. Always recomputed from scratch.

use crate::error::{Result, TelemetryError};
use crate::model::{Component, Fan, SensorReading};
use serde::{Deserialize, Serialize};

/// Statistics for one temperature channel (°C)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    /// Population standard deviation
    pub std: f64,
}

/// Statistics for one fan (RPM)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanSummary {
    pub cpu_fan: FanStats,
    pub gpu_fan: FanStats,
    pub case_fan: FanStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GamingStats {
    /// Readings taken while a gaming session was active
    pub sessions: usize,
    /// Separate sessions seen in the window (idle -> gaming transitions)
    pub distinct_sessions: usize,
    pub avg_intensity: f64,
    /// Share of readings taken while gaming, 0-100
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSummary {
    pub cpu: ChannelStats,
    pub gpu: ChannelStats,
    pub ssd: ChannelStats,
    pub motherboard: ChannelStats,
    pub fans: FanSummary,
    pub gaming: GamingStats,
    pub data_points: usize,
    pub time_span_hours: f64,
}

impl TemperatureSummary {
    pub fn channel(&self, component: Component) -> &ChannelStats {
        match component {
            Component::Cpu => &self.cpu,
            Component::Gpu => &self.gpu,
            Component::Ssd => &self.ssd,
            Component::Motherboard => &self.motherboard,
        }
    }

    pub fn fan(&self, fan: Fan) -> &FanStats {
        match fan {
            Fan::CpuFan => &self.fans.cpu_fan,
            Fan::GpuFan => &self.fans.gpu_fan,
            Fan::CaseFan => &self.fans.case_fan,
        }
    }
}

/// Summarize an ordered sequence of readings
///
/// Fails with [`TelemetryError::EmptyInput`] when `readings` is empty.
pub fn summarize(readings: &[SensorReading]) -> Result<TemperatureSummary> {
    if readings.is_empty() {
        return Err(TelemetryError::EmptyInput);
    }

    let channel = |c: Component| {
        channel_stats(readings.iter().map(|r| r.temperature(c).0))
    };
    let fan = |f: Fan| fan_stats(readings.iter().map(|r| f64::from(r.fan_rpm(f))));

    let n = readings.len();
    let sessions = readings.iter().filter(|r| r.gaming_session).count();
    let distinct_sessions = readings
        .iter()
        .enumerate()
        .filter(|(i, r)| r.gaming_session && (*i == 0 || !readings[i - 1].gaming_session))
        .count();
    let avg_intensity = readings.iter().map(|r| r.gaming_intensity).sum::<f64>() / n as f64;

    Ok(TemperatureSummary {
        cpu: channel(Component::Cpu),
        gpu: channel(Component::Gpu),
        ssd: channel(Component::Ssd),
        motherboard: channel(Component::Motherboard),
        fans: FanSummary {
            cpu_fan: fan(Fan::CpuFan),
            gpu_fan: fan(Fan::GpuFan),
            case_fan: fan(Fan::CaseFan),
        },
        gaming: GamingStats {
            sessions,
            distinct_sessions,
            avg_intensity,
            percentage: sessions as f64 / n as f64 * 100.0,
        },
        data_points: n,
        time_span_hours: time_span_hours(readings),
    })
}

fn channel_stats(values: impl Iterator<Item = f64> + Clone) -> ChannelStats {
    let FanStats { avg, max, min } = fan_stats(values.clone());
    let (sum_sq, n) = values.fold((0.0, 0usize), |(acc, n), v| (acc + (v - avg).powi(2), n + 1));
    ChannelStats {
        avg,
        max,
        min,
        std: (sum_sq / n as f64).sqrt(),
    }
}

fn fan_stats(values: impl Iterator<Item = f64>) -> FanStats {
    let (sum, n, max, min) = values.fold(
        (0.0, 0usize, f64::NEG_INFINITY, f64::INFINITY),
        |(sum, n, max, min), v| (sum + v, n + 1, max.max(v), min.min(v)),
    );
    FanStats {
        avg: sum / n as f64,
        max,
        min,
    }
}

fn time_span_hours(readings: &[SensorReading]) -> f64 {
    if readings.len() < 2 {
        return 0.0;
    }
    let first = readings.iter().map(|r| r.timestamp).min().unwrap_or_default();
    let last = readings.iter().map(|r| r.timestamp).max().unwrap_or_default();
    last.saturating_sub(first) as f64 / 3600.0
}
