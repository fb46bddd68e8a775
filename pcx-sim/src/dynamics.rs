//! Thermal and fan dynamics
//!
//! First-order exponential smoothing toward a moving target, plus bounded
//! noise. This is not a heat-transfer model, only something that looks right
//! on a chart:
//!
//! - temperature target = idle + intensity × load coefficient + ambient drift
//! - fan target = piecewise-linear curve of temperature
//! - actual fan RPM approaches the target at `fan_response_rate` per tick
//!
//! Every value is clamped to its configured bounds after each step.

use crate::gaming::GamingState;
use crate::params::SimulationParams;
use pcx_core::model::{Component, Fan};
use pcx_core::units::{Celsius, Rpm};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Current temperature of every component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    pub cpu: Celsius,
    pub gpu: Celsius,
    pub ssd: Celsius,
    pub motherboard: Celsius,
}

impl Index<Component> for Temperatures {
    type Output = Celsius;

    fn index(&self, component: Component) -> &Celsius {
        match component {
            Component::Cpu => &self.cpu,
            Component::Gpu => &self.gpu,
            Component::Ssd => &self.ssd,
            Component::Motherboard => &self.motherboard,
        }
    }
}

impl IndexMut<Component> for Temperatures {
    fn index_mut(&mut self, component: Component) -> &mut Celsius {
        match component {
            Component::Cpu => &mut self.cpu,
            Component::Gpu => &mut self.gpu,
            Component::Ssd => &mut self.ssd,
            Component::Motherboard => &mut self.motherboard,
        }
    }
}

/// Current speed of every fan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanSpeeds {
    pub cpu_fan: Rpm,
    pub gpu_fan: Rpm,
    pub case_fan: Rpm,
}

impl Index<Fan> for FanSpeeds {
    type Output = Rpm;

    fn index(&self, fan: Fan) -> &Rpm {
        match fan {
            Fan::CpuFan => &self.cpu_fan,
            Fan::GpuFan => &self.gpu_fan,
            Fan::CaseFan => &self.case_fan,
        }
    }
}

impl IndexMut<Fan> for FanSpeeds {
    fn index_mut(&mut self, fan: Fan) -> &mut Rpm {
        match fan {
            Fan::CpuFan => &mut self.cpu_fan,
            Fan::GpuFan => &mut self.gpu_fan,
            Fan::CaseFan => &mut self.case_fan,
        }
    }
}

/// Everything the simulator mutates once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub temperatures: Temperatures,
    pub fan_speeds: FanSpeeds,
    pub gaming: GamingState,
}

impl SimulationState {
    /// Idle machine: every temperature at baseline, fans at idle speed
    pub fn idle(params: &SimulationParams) -> Self {
        Self {
            temperatures: Temperatures {
                cpu: params.cpu.idle,
                gpu: params.gpu.idle,
                ssd: params.ssd.idle,
                motherboard: params.motherboard.idle,
            },
            fan_speeds: FanSpeeds {
                cpu_fan: params.cpu_fan.idle_rpm,
                gpu_fan: params.gpu_fan.idle_rpm,
                case_fan: params.case_fan.idle_rpm,
            },
            gaming: GamingState::default(),
        }
    }

    /// Temperature the fan controller reads for a given fan
    ///
    /// The case fan follows the average of CPU and GPU.
    pub fn fan_input(&self, fan: Fan) -> f64 {
        match fan {
            Fan::CpuFan => self.temperatures.cpu.0,
            Fan::GpuFan => self.temperatures.gpu.0,
            Fan::CaseFan => (self.temperatures.cpu.0 + self.temperatures.gpu.0) / 2.0,
        }
    }
}

/// Target temperature for a component at unix time `now`
pub fn temperature_target(
    params: &SimulationParams,
    component: Component,
    intensity: f64,
    now: f64,
) -> f64 {
    let ch = params.channel(component);
    ch.idle.0 + intensity * ch.load_coefficient + params.ambient.drift(now)
}

/// Move every temperature one step toward its target
pub fn step_temperatures<R: Rng + ?Sized>(
    state: &mut SimulationState,
    params: &SimulationParams,
    rng: &mut R,
    now: f64,
) {
    let gaming = state.gaming.active;
    let intensity = state.gaming.intensity;

    for component in Component::ALL {
        let ch = params.channel(component);
        let target = temperature_target(params, component, intensity, now);
        let rate = if gaming { ch.rate_gaming } else { ch.rate_idle };
        let current = state.temperatures[component];

        let delta = (target - current.0) * rate + rng.gen_range(ch.noise_low..=ch.noise_high);
        state.temperatures[component] = Celsius(current.0 + delta).clamp(ch.min, ch.max);
    }
}

/// Instantaneous target RPM for every fan from the current temperatures
pub fn fan_targets(state: &SimulationState, params: &SimulationParams) -> FanSpeeds {
    let target = |fan: Fan| Rpm(params.fan(fan).curve.eval(state.fan_input(fan)));
    FanSpeeds {
        cpu_fan: target(Fan::CpuFan),
        gpu_fan: target(Fan::GpuFan),
        case_fan: target(Fan::CaseFan),
    }
}

/// Move every fan one step toward its target, then jitter and clamp
pub fn step_fans<R: Rng + ?Sized>(state: &mut SimulationState, params: &SimulationParams, rng: &mut R) {
    let targets = fan_targets(state, params);

    for fan in Fan::ALL {
        let fp = params.fan(fan);
        let current = state.fan_speeds[fan].0;
        let approached = current + (targets[fan].0 - current) * params.fan_response_rate;
        let jitter = f64::from(rng.gen_range(-fp.jitter..=fp.jitter));
        state.fan_speeds[fan] = Rpm(approached + jitter).clamp(fp.max_rpm);
    }
}

/// One full dynamics update: temperatures first, then fans from the new temperatures
pub fn step<R: Rng + ?Sized>(state: &mut SimulationState, params: &SimulationParams, rng: &mut R, now: f64) {
    step_temperatures(state, params, rng, now);
    step_fans(state, params, rng);
}
