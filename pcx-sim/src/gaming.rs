//! Gaming session state machine
//!
//! Produces the scalar workload signal that drives the thermal model:
//!
//! ```text
//! IDLE --p_start--> WARMUP --age > warmup--> ACTIVE --age > warmup + active--> COOLDOWN
//!  ^                                                                              |
//!  +------------------------------- intensity reaches 0 --------------------------+
//! ```
//!
//! All randomness comes from the caller's RNG so a fixed seed replays the
//! exact same sequence of sessions.

use crate::params::GamingParams;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Intensity at or below this is treated as zero when cooling down
const INTENSITY_EPSILON: f64 = 1e-9;

/// Intensity a session starts with on its first tick
const START_INTENSITY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamingPhase {
    Idle,
    Warmup,
    Active,
    Cooldown,
}

/// Gaming portion of the simulation state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GamingState {
    pub phase: GamingPhase,
    pub active: bool,
    /// 0.0 whenever `active` is false
    pub intensity: f64,
    /// Ticks since the session started
    pub session_age: u32,
    pub cooling_down: bool,
}

impl Default for GamingState {
    fn default() -> Self {
        Self {
            phase: GamingPhase::Idle,
            active: false,
            intensity: 0.0,
            session_age: 0,
            cooling_down: false,
        }
    }
}

impl GamingState {
    /// Advance the state machine by one tick
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R, params: &GamingParams) {
        if self.phase == GamingPhase::Idle {
            if rng.gen_bool(params.start_probability) {
                self.begin_session();
            }
            return;
        }

        self.session_age = self.session_age.saturating_add(1);
        let age = self.session_age;
        let active_end = params.active_end().unwrap_or(u32::MAX);

        match self.phase {
            GamingPhase::Warmup if age > params.warmup_ticks => {
                debug!(age, "warmup finished, session active");
                self.phase = GamingPhase::Active;
                self.intensity = active_intensity(rng, age);
            }
            GamingPhase::Warmup => {
                let ramp = f64::from(age) / f64::from(params.warmup_ticks) * params.warmup_ceiling;
                self.intensity = (ramp + rng.gen_range(-0.1..=0.1)).clamp(0.0, 0.9);
            }
            GamingPhase::Active if age > active_end => {
                info!(age, "gaming session ending, starting cooldown");
                self.phase = GamingPhase::Cooldown;
                self.cooling_down = true;
                self.cool(params.cooldown_rate);
            }
            GamingPhase::Active => {
                self.intensity = active_intensity(rng, age);
            }
            GamingPhase::Cooldown => self.cool(params.cooldown_rate),
            GamingPhase::Idle => {}
        }
    }

    fn begin_session(&mut self) {
        info!("gaming session started");
        *self = Self {
            phase: GamingPhase::Warmup,
            active: true,
            intensity: START_INTENSITY,
            session_age: 0,
            cooling_down: false,
        };
    }

    fn cool(&mut self, rate: f64) {
        self.intensity = (self.intensity - rate).max(0.0);
        if self.intensity <= INTENSITY_EPSILON {
            info!(age = self.session_age, "returned to idle");
            *self = Self::default();
        }
    }
}

/// Sustained load: slow drift plus faster scene changes plus random spikes
fn active_intensity<R: Rng + ?Sized>(rng: &mut R, age: u32) -> f64 {
    let t = f64::from(age);
    let base = 0.75 + 0.2 * (t * 0.05).sin();
    let scene = 0.15 * (t * 0.3).sin();
    let spike = rng.gen_range(-0.1..=0.15);
    (base + scene + spike).clamp(0.5, 1.0)
}
