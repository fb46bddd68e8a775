//! Simulation parameters
//!
//! All constants are empirically tuned defaults. They can be overridden from
//! the config file; only the qualitative shape matters (monotonic fan curves,
//! smoothed approach, bounded jitter).

use pcx_core::model::{Component, Fan};
use pcx_core::units::{Celsius, Rpm};
use serde::{Deserialize, Serialize};

/// Per-component thermal behaviour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Idle baseline temperature
    pub idle: Celsius,
    /// Lower clamp
    pub min: Celsius,
    /// Upper clamp (component thermal limit)
    pub max: Celsius,
    /// Degrees added to the target at intensity 1.0
    pub load_coefficient: f64,
    /// Fraction of the gap to target closed per tick while idle
    pub rate_idle: f64,
    /// Fraction of the gap to target closed per tick while gaming
    pub rate_gaming: f64,
    /// Uniform noise range added to each step
    pub noise_low: f64,
    pub noise_high: f64,
}

/// One linear piece of a fan target curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSegment {
    /// Segment applies while the input is below this bound; `None` is unbounded
    #[serde(default)]
    pub below: Option<f64>,
    pub base: f64,
    pub origin: f64,
    pub slope: f64,
}

/// Piecewise-linear map from temperature to target RPM
///
/// The first segment whose `below` exceeds the input is used, falling back
/// to the last segment. Output is floored at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseCurve {
    pub segments: Vec<CurveSegment>,
}

impl PiecewiseCurve {
    pub fn new(segments: Vec<CurveSegment>) -> Self {
        Self { segments }
    }

    pub fn eval(&self, temp: f64) -> f64 {
        let seg = self
            .segments
            .iter()
            .find(|s| s.below.map_or(true, |b| temp < b))
            .or_else(|| self.segments.last());
        match seg {
            Some(s) => (s.base + (temp - s.origin) * s.slope).max(0.0),
            None => 0.0,
        }
    }
}

fn seg(below: f64, base: f64, origin: f64, slope: f64) -> CurveSegment {
    CurveSegment {
        below: below.is_finite().then_some(below),
        base,
        origin,
        slope,
    }
}

/// Per-fan controller behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanParams {
    pub idle_rpm: Rpm,
    pub max_rpm: Rpm,
    /// Integer jitter in `[-jitter, jitter]` RPM added each tick
    pub jitter: i32,
    pub curve: PiecewiseCurve,
}

/// Gaming session state machine settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GamingParams {
    /// Per-tick probability of leaving idle
    pub start_probability: f64,
    pub warmup_ticks: u32,
    pub active_duration_ticks: u32,
    /// Intensity removed per cooldown tick
    pub cooldown_rate: f64,
    /// Intensity reached at the end of warmup (before jitter)
    pub warmup_ceiling: f64,
}

impl GamingParams {
    /// Last tick of the active phase, `None` when it does not fit in a `u32`
    pub fn active_end(&self) -> Option<u32> {
        self.warmup_ticks.checked_add(self.active_duration_ticks)
    }

    /// Upper bound on the number of ticks a session lasts
    pub fn max_session_ticks(&self) -> Option<u32> {
        let cooldown = (1.0 / self.cooldown_rate).ceil() as u32;
        self.active_end()?.checked_add(cooldown)
    }
}

/// Slow room-temperature drift
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientParams {
    pub amplitude: f64,
    /// Angular frequency in radians per second of wall-clock time
    pub frequency: f64,
}

impl AmbientParams {
    /// Offset added to every channel target at unix time `t` seconds
    pub fn drift(&self, t: f64) -> f64 {
        self.amplitude * (t * self.frequency).sin()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub cpu: ChannelParams,
    pub gpu: ChannelParams,
    pub ssd: ChannelParams,
    pub motherboard: ChannelParams,
    pub cpu_fan: FanParams,
    pub gpu_fan: FanParams,
    pub case_fan: FanParams,
    /// Fraction of the gap to target RPM closed per tick
    pub fan_response_rate: f64,
    pub gaming: GamingParams,
    pub ambient: AmbientParams,
}

impl SimulationParams {
    pub fn channel(&self, component: Component) -> &ChannelParams {
        match component {
            Component::Cpu => &self.cpu,
            Component::Gpu => &self.gpu,
            Component::Ssd => &self.ssd,
            Component::Motherboard => &self.motherboard,
        }
    }

    pub fn fan(&self, fan: Fan) -> &FanParams {
        match fan {
            Fan::CpuFan => &self.cpu_fan,
            Fan::GpuFan => &self.gpu_fan,
            Fan::CaseFan => &self.case_fan,
        }
    }

    /// Reject values that would break the clamping or state machine invariants
    pub fn validate(&self) -> Result<(), String> {
        for c in Component::ALL {
            let ch = self.channel(c);
            if ch.min.0.is_nan() || ch.max.0.is_nan() || ch.min.0 > ch.max.0 {
                return Err(format!("{}: min above max", c.key()));
            }
            if !(0.0..=1.0).contains(&ch.rate_idle) || !(0.0..=1.0).contains(&ch.rate_gaming) {
                return Err(format!("{}: smoothing rate outside [0, 1]", c.key()));
            }
            if !ch.noise_low.is_finite() || !ch.noise_high.is_finite() {
                return Err(format!("{}: noise bounds must be finite", c.key()));
            }
            if ch.noise_low > ch.noise_high {
                return Err(format!("{}: empty noise range", c.key()));
            }
        }
        for f in Fan::ALL {
            let fan = self.fan(f);
            if fan.curve.segments.is_empty() {
                return Err(format!("{}: empty fan curve", f.key()));
            }
            if fan.jitter < 0 {
                return Err(format!("{}: negative jitter", f.key()));
            }
            if fan.max_rpm.0.is_nan() || fan.max_rpm.0 < 0.0 {
                return Err(format!("{}: max_rpm must be non-negative", f.key()));
            }
        }
        if !(0.0..=1.0).contains(&self.fan_response_rate) {
            return Err("fan_response_rate outside [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.gaming.start_probability) {
            return Err("gaming.start_probability outside [0, 1]".to_string());
        }
        let rate = self.gaming.cooldown_rate;
        if rate.is_nan() || rate <= 0.0 || self.gaming.warmup_ticks == 0 {
            return Err("gaming cooldown_rate and warmup_ticks must be positive".to_string());
        }
        if self.gaming.max_session_ticks().is_none() {
            return Err("gaming session length overflows the tick counter".to_string());
        }
        Ok(())
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            cpu: ChannelParams {
                idle: Celsius(42.0),
                min: Celsius(25.0),
                max: Celsius(88.0),
                load_coefficient: 35.0,
                rate_idle: 0.08,
                rate_gaming: 0.12,
                noise_low: -1.2,
                noise_high: 1.2,
            },
            gpu: ChannelParams {
                idle: Celsius(38.0),
                min: Celsius(25.0),
                max: Celsius(85.0),
                load_coefficient: 40.0,
                rate_idle: 0.06,
                rate_gaming: 0.10,
                noise_low: -1.5,
                noise_high: 1.8,
            },
            ssd: ChannelParams {
                idle: Celsius(35.0),
                min: Celsius(20.0),
                max: Celsius(70.0),
                load_coefficient: 15.0,
                rate_idle: 0.06,
                rate_gaming: 0.06,
                noise_low: -0.6,
                noise_high: 0.6,
            },
            motherboard: ChannelParams {
                idle: Celsius(33.0),
                min: Celsius(20.0),
                max: Celsius(60.0),
                load_coefficient: 12.0,
                rate_idle: 0.05,
                rate_gaming: 0.05,
                noise_low: -0.4,
                noise_high: 0.4,
            },
            cpu_fan: FanParams {
                idle_rpm: Rpm(1200.0),
                max_rpm: Rpm(4800.0),
                jitter: 25,
                curve: PiecewiseCurve::new(vec![
                    seg(45.0, 800.0, 40.0, 60.0),
                    seg(65.0, 1100.0, 45.0, 85.0),
                    seg(80.0, 2800.0, 65.0, 120.0),
                    seg(f64::INFINITY, 4600.0, 80.0, 50.0),
                ]),
            },
            gpu_fan: FanParams {
                idle_rpm: Rpm(1000.0),
                max_rpm: Rpm(4200.0),
                jitter: 20,
                curve: PiecewiseCurve::new(vec![
                    seg(40.0, 600.0, 35.0, 80.0),
                    seg(60.0, 1200.0, 40.0, 70.0),
                    seg(75.0, 2600.0, 60.0, 90.0),
                    seg(f64::INFINITY, 3950.0, 75.0, 60.0),
                ]),
            },
            case_fan: FanParams {
                idle_rpm: Rpm(800.0),
                max_rpm: Rpm(2800.0),
                jitter: 15,
                curve: PiecewiseCurve::new(vec![
                    seg(45.0, 400.0, 35.0, 25.0),
                    seg(65.0, 650.0, 45.0, 40.0),
                    seg(f64::INFINITY, 1450.0, 65.0, 55.0),
                ]),
            },
            fan_response_rate: 0.15,
            gaming: GamingParams {
                start_probability: 0.02,
                warmup_ticks: 30,
                active_duration_ticks: 120,
                cooldown_rate: 0.02,
                warmup_ceiling: 0.7,
            },
            ambient: AmbientParams {
                amplitude: 2.0,
                frequency: 0.0001,
            },
        }
    }
}
