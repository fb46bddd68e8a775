//! Gaming PC thermal and fan-control simulator
//!
//! A discrete gaming-session state machine drives continuous temperature
//! and fan-speed state. The simulator is a `TelemetrySource`, so the server
//! drives it exactly like a hardware sensor backend.

pub mod dynamics;
pub mod gaming;
pub mod params;
pub mod simulator;

pub use dynamics::SimulationState;
pub use gaming::{GamingPhase, GamingState};
pub use params::SimulationParams;
pub use simulator::PcSimulator;
