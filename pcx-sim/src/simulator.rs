//! Gaming PC simulator
//!
//! Owns the simulation state and a seeded RNG. Each tick runs the gaming
//! session state machine, then the thermal/fan dynamics, then assembles a
//! `SensorReading`. Timestamps are derived from a fixed epoch and the tick
//! count rather than the wall clock, so two simulators built with the same
//! seed and epoch produce identical readings.

use crate::dynamics::{self, SimulationState};
use crate::params::SimulationParams;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use pcx_core::units::Celsius;
use pcx_core::{SensorReading, TelemetrySource};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing::info;

pub struct PcSimulator {
    params: SimulationParams,
    state: SimulationState,
    rng: StdRng,
    device_id: String,
    epoch: DateTime<Utc>,
    tick_period: Duration,
    ticks: u64,
    active: bool,
}

impl PcSimulator {
    pub fn new(
        params: SimulationParams,
        device_id: impl Into<String>,
        seed: u64,
        epoch: DateTime<Utc>,
        tick_period: Duration,
    ) -> Result<Self> {
        params.validate().map_err(|e| anyhow!("invalid simulation parameters: {}", e))?;
        let state = SimulationState::idle(&params);
        Ok(Self {
            params,
            state,
            rng: StdRng::seed_from_u64(seed),
            device_id: device_id.into(),
            epoch,
            tick_period,
            ticks: 0,
            active: false,
        })
    }

    /// Default parameters, one tick per second starting at `epoch`
    pub fn with_seed(seed: u64, epoch: DateTime<Utc>) -> Self {
        let params = SimulationParams::default();
        let state = SimulationState::idle(&params);
        Self {
            params,
            state,
            rng: StdRng::seed_from_u64(seed),
            device_id: "GamingPC4".to_string(),
            epoch,
            tick_period: Duration::from_secs(1),
            ticks: 0,
            active: false,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Mutable access for tuning between ticks (e.g. forcing a session start)
    pub fn params_mut(&mut self) -> &mut SimulationParams {
        &mut self.params
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated wall-clock time of the current tick
    fn now(&self) -> f64 {
        self.epoch.timestamp() as f64 + self.ticks as f64 * self.tick_period.as_secs_f64()
    }

    /// Advance one tick and return its reading
    pub fn tick(&mut self) -> SensorReading {
        let now = self.now();

        self.state.gaming.step(&mut self.rng, &self.params.gaming);
        dynamics::step(&mut self.state, &self.params, &mut self.rng, now);
        let reading = self.snapshot(now as i64);

        self.ticks += 1;
        reading
    }

    /// Run `n` ticks, collecting every reading
    pub fn run(&mut self, n: usize) -> Vec<SensorReading> {
        (0..n).map(|_| self.tick()).collect()
    }

    fn snapshot(&self, timestamp: i64) -> SensorReading {
        let t = &self.state.temperatures;
        let f = &self.state.fan_speeds;
        let g = &self.state.gaming;

        SensorReading {
            timestamp,
            device_id: self.device_id.clone(),
            cpu_temp: round_temp(t.cpu),
            gpu_temp: round_temp(t.gpu),
            ssd_temp: round_temp(t.ssd),
            motherboard_temp: round_temp(t.motherboard),
            cpu_fan_rpm: f.cpu_fan.whole(),
            gpu_fan_rpm: f.gpu_fan.whole(),
            case_fan_rpm: f.case_fan.whole(),
            gaming_session: g.active,
            gaming_intensity: (g.intensity * 100.0).round() / 100.0,
        }
    }
}

fn round_temp(c: Celsius) -> Celsius {
    Celsius(c.rounded())
}

impl TelemetrySource for PcSimulator {
    fn name(&self) -> &str {
        "Simulator"
    }

    fn start(&mut self) -> Result<()> {
        info!(
            device_id = %self.device_id,
            cpu = self.state.temperatures.cpu.0,
            gpu = self.state.temperatures.gpu.0,
            "PC component simulator started"
        );
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        info!(ticks = self.ticks, "PC component simulator stopped");
        self.active = false;
        Ok(())
    }

    fn read_reading(&mut self) -> Result<Option<SensorReading>> {
        if !self.active {
            return Ok(None);
        }
        Ok(Some(self.tick()))
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
