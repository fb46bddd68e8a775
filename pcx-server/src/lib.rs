//! PC MetricsX server library
//!
//! Exposes server components for integration testing.

pub mod api;
pub mod config;
pub mod driver;
pub mod recommender;
pub mod sinks;
pub mod state;
