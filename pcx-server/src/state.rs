//! Application state management

use crate::recommender::Recommender;
use pcx_core::log_format::load_readings;
use pcx_core::model::{FanCurveRecommendation, Preference, TelemetryWindow};
use pcx_core::{summarize, SensorReading, TelemetryError, TemperatureSummary};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

/// Readings handed to the recommender
pub const RECOMMENDATION_WINDOW: usize = 100;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Recent readings, newest last
    pub history: Arc<RwLock<TelemetryWindow>>,

    pub recommender: Arc<Recommender>,

    /// Broadcast channel for live readings
    /// Multiple consumers can subscribe to receive readings
    pub telemetry_tx: broadcast::Sender<SensorReading>,
}

impl AppState {
    pub fn new(recommender: Recommender, history_capacity: usize) -> Self {
        // Create broadcast channel with capacity for 100 readings
        let (telemetry_tx, _) = broadcast::channel(100);

        Self {
            history: Arc::new(RwLock::new(TelemetryWindow::new(history_capacity))),
            recommender: Arc::new(recommender),
            telemetry_tx,
        }
    }

    /// Store a reading and broadcast it to subscribers
    pub async fn record(&self, reading: SensorReading) {
        self.history.write().await.push(reading.clone());
        // Ignore error if no receivers (they'll get the next reading)
        let _ = self.telemetry_tx.send(reading);
    }

    pub async fn current_reading(&self) -> Option<SensorReading> {
        self.history.read().await.latest().cloned()
    }

    /// Readings from the last `minutes` minutes before unix time `now`
    pub async fn history_minutes(&self, now: i64, minutes: u32) -> Vec<SensorReading> {
        self.history.read().await.recent_minutes(now, minutes)
    }

    pub async fn summary(&self, now: i64, minutes: u32) -> Result<TemperatureSummary, TelemetryError> {
        summarize(&self.history_minutes(now, minutes).await)
    }

    /// Recommend fan curves from the most recent readings
    pub async fn recommend(
        &self,
        preference: Preference,
    ) -> Result<FanCurveRecommendation, TelemetryError> {
        let recent = self.history.read().await.last_n(RECOMMENDATION_WINDOW);
        let summary = summarize(&recent)?;
        Ok(self.recommender.recommend(&summary, preference).await)
    }

    /// Seed the window from an existing sensor log, returning the number loaded
    pub async fn load_history(&self, path: &Path) -> Result<usize, TelemetryError> {
        let parsed = load_readings(path)?;
        let loaded = parsed.entries.len();
        info!(
            path = %path.display(),
            loaded,
            skipped = parsed.skipped.len(),
            complete = parsed.complete,
            "history loaded"
        );
        self.history.write().await.extend(parsed.entries);
        Ok(loaded)
    }

    /// Subscribe to live readings
    pub fn subscribe(&self) -> broadcast::Receiver<SensorReading> {
        self.telemetry_tx.subscribe()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Recommender::default(), TelemetryWindow::DEFAULT_CAPACITY)
    }
}
