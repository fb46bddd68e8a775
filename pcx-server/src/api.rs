//! REST API and SSE routes

use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures::stream::{Stream, StreamExt as FuturesStreamExt};
use pcx_core::model::Preference;
use pcx_core::TelemetryError;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;

const DEFAULT_MINUTES: u32 = 30;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/current_data", get(current_data))
        .route("/api/history_data", get(history_data))
        .route("/api/summary", get(summary))
        .route("/api/ai_recommendations", post(ai_recommendations))
        .route("/api/telemetry/stream", get(telemetry_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON error body with a status code
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<TelemetryError> for ApiError {
    fn from(e: TelemetryError) -> Self {
        let status = match e {
            TelemetryError::EmptyInput => StatusCode::NOT_FOUND,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

#[derive(Deserialize)]
struct WindowQuery {
    minutes: Option<u32>,
}

impl WindowQuery {
    fn minutes(&self) -> u32 {
        self.minutes.unwrap_or(DEFAULT_MINUTES)
    }
}

// === Snapshot Endpoints ===

async fn current_data(State(state): State<AppState>) -> Json<serde_json::Value> {
    let current = state.current_reading().await;
    Json(json!({ "current_data": current }))
}

async fn history_data(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<serde_json::Value> {
    let history = state
        .history_minutes(Utc::now().timestamp(), query.minutes())
        .await;
    Json(json!({
        "total_points": history.len(),
        "history": history,
    }))
}

async fn summary(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = state
        .summary(Utc::now().timestamp(), query.minutes())
        .await?;
    Ok(Json(json!({ "success": true, "summary": summary })))
}

// === Recommendation Endpoint ===

#[derive(Deserialize, Default)]
struct RecommendationRequest {
    preference: Option<String>,
}

async fn ai_recommendations(
    State(state): State<AppState>,
    body: Option<Json<RecommendationRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let preference = match request.preference {
        Some(raw) => raw.parse::<Preference>().map_err(|message| ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
        })?,
        None => Preference::default(),
    };

    let recommendations = state.recommend(preference).await?;
    tracing::info!(
        %preference,
        source = ?recommendations.source,
        "fan-curve recommendation served"
    );
    Ok(Json(json!({
        "success": true,
        "recommendations": recommendations,
    })))
}

// === Telemetry Stream Endpoint ===

async fn telemetry_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(reading) => match serde_json::to_string(&reading) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(e) => {
                    tracing::error!("Failed to serialize reading: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Broadcast stream error: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
