//! Integration tests for the pcx-server HTTP API
//!
//! Uses tower::ServiceExt::oneshot to test routes directly without binding a port.

use axum::body::Body;
use chrono::Utc;
use http_body_util::BodyExt;
use hyper::Request;
use pcx_core::units::Celsius;
use pcx_core::SensorReading;
use pcx_server::{api::create_router, state::AppState};
use tower::ServiceExt;

/// Helper: build a router with fresh AppState (no readings recorded)
fn app() -> axum::Router {
    create_router(AppState::default())
}

/// Helper: build a router with AppState returned for further manipulation
fn app_with_state() -> (axum::Router, AppState) {
    let state = AppState::default();
    let router = create_router(state.clone());
    (router, state)
}

/// Helper: collect response body into JSON
async fn body_json(body: Body) -> serde_json::Value {
    let collected = body.collect().await.unwrap();
    serde_json::from_slice(&collected.to_bytes()).unwrap()
}

fn reading(timestamp: i64, cpu: f64, gaming: bool) -> SensorReading {
    SensorReading {
        timestamp,
        device_id: "GamingPC4".to_string(),
        cpu_temp: Celsius(cpu),
        gpu_temp: Celsius(cpu - 5.0),
        ssd_temp: Celsius(38.0),
        motherboard_temp: Celsius(35.0),
        cpu_fan_rpm: 1450,
        gpu_fan_rpm: 1200,
        case_fan_rpm: 900,
        gaming_session: gaming,
        gaming_intensity: if gaming { 0.8 } else { 0.0 },
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

// ==================== GET /api/current_data ====================

#[tokio::test]
async fn test_current_data_empty_is_null() {
    let response = app().oneshot(get("/api/current_data")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    assert!(body["current_data"].is_null());
}

#[tokio::test]
async fn test_current_data_returns_latest_reading() {
    let (app, state) = app_with_state();
    let now = Utc::now().timestamp();
    state.record(reading(now - 1, 45.0, false)).await;
    state.record(reading(now, 52.3, true)).await;

    let response = app.oneshot(get("/api/current_data")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["current_data"]["timestamp"], now);
    assert_eq!(body["current_data"]["cpu_temp"], 52.3);
    assert_eq!(body["current_data"]["gaming_session"], true);
}

// ==================== GET /api/history_data ====================

#[tokio::test]
async fn test_history_defaults_to_thirty_minutes() {
    let (app, state) = app_with_state();
    let now = Utc::now().timestamp();
    state.record(reading(now - 3 * 3600, 40.0, false)).await;
    state.record(reading(now - 20 * 60, 41.0, false)).await;
    state.record(reading(now - 5, 42.0, false)).await;

    let response = app.oneshot(get("/api/history_data")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["total_points"], 2);
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
    assert_eq!(body["history"][0]["cpu_temp"], 41.0);
}

#[tokio::test]
async fn test_history_minutes_parameter() {
    let (app, state) = app_with_state();
    let now = Utc::now().timestamp();
    state.record(reading(now - 3 * 3600, 40.0, false)).await;
    state.record(reading(now - 5, 42.0, false)).await;

    let response = app
        .oneshot(get("/api/history_data?minutes=240"))
        .await
        .unwrap();
    let body = body_json(response.into_body()).await;
    assert_eq!(body["total_points"], 2);
}

#[tokio::test]
async fn test_history_empty_is_empty_list() {
    let response = app().oneshot(get("/api/history_data")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["total_points"], 0);
    assert!(body["history"].as_array().unwrap().is_empty());
}

// ==================== GET /api/summary ====================

#[tokio::test]
async fn test_summary_empty_is_404() {
    let response = app().oneshot(get("/api/summary")).await.unwrap();
    assert_eq!(response.status(), 404);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("insufficient data"));
}

#[tokio::test]
async fn test_summary_aggregates_recent_window() {
    let (app, state) = app_with_state();
    let now = Utc::now().timestamp();
    state.record(reading(now - 20, 50.0, false)).await;
    state.record(reading(now - 10, 60.0, true)).await;
    state.record(reading(now, 70.0, true)).await;

    let response = app.oneshot(get("/api/summary?minutes=5")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    let summary = &body["summary"];
    assert_eq!(summary["data_points"], 3);
    assert_eq!(summary["cpu"]["avg"], 60.0);
    assert_eq!(summary["cpu"]["max"], 70.0);
    assert_eq!(summary["gaming"]["sessions"], 2);
}

// ==================== POST /api/ai_recommendations ====================

#[tokio::test]
async fn test_recommendations_without_data_is_404() {
    let response = app()
        .oneshot(post_json("/api/ai_recommendations", r#"{"preference":"balanced"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_recommendations_hot_history_bumps_cpu_curve() {
    let (app, state) = app_with_state();
    let now = Utc::now().timestamp();
    for i in 0..100 {
        state.record(reading(now - 100 + i, 80.0, true)).await;
    }

    let response = app
        .oneshot(post_json("/api/ai_recommendations", r#"{"preference":"balanced"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    let rec = &body["recommendations"];
    assert_eq!(rec["preference"], "balanced");
    assert_eq!(rec["source"], "local");

    let cpu: Vec<u64> = rec["fan_curves"]["cpu_fan"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    assert_eq!(cpu, vec![900, 1400, 2100, 3200, 4000]);
    for fan in ["cpu_fan", "gpu_fan", "case_fan"] {
        assert_eq!(rec["fan_curves"][fan].as_array().unwrap().len(), 5);
    }
}

#[tokio::test]
async fn test_recommendations_default_preference() {
    let (app, state) = app_with_state();
    state.record(reading(Utc::now().timestamp(), 45.0, false)).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ai_recommendations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["recommendations"]["preference"], "balanced");
}

#[tokio::test]
async fn test_recommendations_unknown_preference_is_400() {
    let (app, state) = app_with_state();
    state.record(reading(Utc::now().timestamp(), 45.0, false)).await;

    let response = app
        .oneshot(post_json("/api/ai_recommendations", r#"{"preference":"turbo"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body = body_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("turbo"));
}

// ==================== GET /api/telemetry/stream ====================

#[tokio::test]
async fn test_telemetry_stream_returns_sse_content_type() {
    let response = app().oneshot(get("/api/telemetry/stream")).await.unwrap();
    assert_eq!(response.status(), 200);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(
        content_type.contains("text/event-stream"),
        "SSE endpoint should return text/event-stream, got: {}",
        content_type
    );
}

#[tokio::test]
async fn test_telemetry_stream_receives_recorded_reading() {
    let (app, state) = app_with_state();

    // Record a reading shortly after the stream connects
    let producer = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        producer.record(reading(1_750_263_292, 61.5, true)).await;
    });

    let response = app.oneshot(get("/api/telemetry/stream")).await.unwrap();
    assert_eq!(response.status(), 200);

    // Read the body with a timeout to avoid hanging forever
    let body = response.into_body();
    let result = tokio::time::timeout(std::time::Duration::from_secs(3), async {
        let mut stream = body.into_data_stream();
        use futures::StreamExt;
        if let Some(Ok(chunk)) = stream.next().await {
            return Some(String::from_utf8(chunk.to_vec()).unwrap());
        }
        None
    })
    .await;

    let text = result
        .expect("timed out waiting for SSE event")
        .expect("stream ended without an event");
    // SSE events are formatted as "data: {...}\n\n"
    let payload = text
        .lines()
        .find_map(|l| l.strip_prefix("data: "))
        .expect("event should carry a data line");
    let parsed: SensorReading = serde_json::from_str(payload).unwrap();
    assert_eq!(parsed.cpu_temp, Celsius(61.5));
    assert!(parsed.gaming_session);
}
