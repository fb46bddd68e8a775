//! Tick loop
//!
//! Once per period:
//! - read one reading from the source
//! - record it in the shared state (window + broadcast)
//! - fan it out to every sink
//!
//! A failing sink is logged and counted, never fatal. On shutdown the sinks
//! are flushed in order and their in-flight sends drained before the source
//! is stopped.

use crate::sinks::Sink;
use crate::state::AppState;
use anyhow::{Context, Result};
use pcx_core::{SensorReading, TelemetryError, TelemetrySource};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATUS_EVERY: u64 = 100;

/// Longest wait for a sink's background sends after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub ticks: u64,
    pub readings: u64,
    pub sink_failures: u64,
    pub source_failures: u64,
}

pub struct Driver {
    source: Box<dyn TelemetrySource>,
    sinks: Vec<Box<dyn Sink>>,
    state: AppState,
    period: Duration,
    stats: DriverStats,
}

impl Driver {
    pub fn new(
        source: Box<dyn TelemetrySource>,
        sinks: Vec<Box<dyn Sink>>,
        state: AppState,
        period: Duration,
    ) -> Self {
        Self {
            source,
            sinks,
            state,
            period,
            stats: DriverStats::default(),
        }
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Run a single tick, returning the reading if the source produced one
    pub async fn tick(&mut self) -> Option<SensorReading> {
        self.stats.ticks += 1;

        let reading = match self.source.read_reading() {
            Ok(Some(reading)) => reading,
            Ok(None) => return None,
            Err(e) => {
                self.stats.source_failures += 1;
                warn!("Error reading from {}: {:#}", self.source.name(), e);
                return None;
            }
        };
        self.stats.readings += 1;

        self.state.record(reading.clone()).await;
        self.dispatch(&reading);

        if self.stats.ticks % STATUS_EVERY == 0 {
            debug!(
                ticks = self.stats.ticks,
                cpu = reading.cpu_temp.0,
                gpu = reading.gpu_temp.0,
                gaming = reading.gaming_session,
                sink_failures = self.stats.sink_failures,
                "driver status"
            );
        }
        Some(reading)
    }

    fn dispatch(&mut self, reading: &SensorReading) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.send(reading) {
                self.stats.sink_failures += 1;
                let err = TelemetryError::SinkUnavailable {
                    sink: sink.name().to_string(),
                    reason: format!("{:#}", e),
                };
                warn!("{}", err);
            }
        }
    }

    /// Tick until cancelled or until `max_ticks` readings have been produced
    pub async fn run(
        mut self,
        shutdown: CancellationToken,
        max_ticks: Option<u64>,
    ) -> Result<DriverStats> {
        self.source
            .start()
            .with_context(|| format!("failed to start source {}", self.source.name()))?;
        info!(
            source = self.source.name(),
            sinks = self.sinks.len(),
            period_ms = self.period.as_millis() as u64,
            "driver started"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                    if max_ticks.is_some_and(|max| self.stats.readings >= max) {
                        break;
                    }
                }
            }
        }

        self.shutdown_sinks().await;
        if let Err(e) = self.source.stop() {
            warn!("Error stopping {}: {:#}", self.source.name(), e);
        }
        info!(
            ticks = self.stats.ticks,
            readings = self.stats.readings,
            sink_failures = self.stats.sink_failures,
            "driver stopped"
        );
        Ok(self.stats)
    }

    async fn shutdown_sinks(&mut self) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.shutdown() {
                warn!("Error shutting down sink {}: {:#}", sink.name(), e);
            }
            let Some(tasks) = sink.in_flight() else {
                continue;
            };
            tasks.close();
            if tokio::time::timeout(DRAIN_TIMEOUT, tasks.wait()).await.is_err() {
                warn!(
                    sink = sink.name(),
                    pending = tasks.len(),
                    "gave up waiting for in-flight sends"
                );
            }
        }
    }
}
