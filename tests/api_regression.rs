//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use plantwatch::alerts::LogNotifier;
use plantwatch::api::{create_app, ApiState};
use plantwatch::config::PlantConfig;
use plantwatch::engine::DetectionEngine;
use plantwatch::monitoring::MonitoringScheduler;
use plantwatch::scoring::ThresholdScorer;
use plantwatch::store::{synthetic, MemoryStore};
use plantwatch::types::Reading;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn create_test_state(readings: Vec<Reading>) -> ApiState {
    let config = Arc::new(PlantConfig::default());
    let engine = Arc::new(DetectionEngine::new(
        Arc::clone(&config),
        Arc::new(MemoryStore::new(readings)),
        Arc::new(ThresholdScorer::default()),
        Arc::new(LogNotifier),
    ));
    let scheduler = Arc::new(MonitoringScheduler::new(
        Arc::clone(&engine) as Arc<dyn plantwatch::CycleRunner>,
        CancellationToken::new(),
    ));
    ApiState { engine, scheduler }
}

fn demo_state() -> ApiState {
    let machines = PlantConfig::default().plant.machines;
    create_test_state(synthetic::demo_readings(&machines, 24, Utc::now()))
}

async fn call(state: &ApiState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let app = create_app(state.clone());
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// All GET endpoints should return 200 with the success envelope.
#[tokio::test]
async fn test_get_endpoints_return_200() {
    let state = demo_state();

    let endpoints = [
        "/api/v1/health",
        "/api/v1/machines/status",
        "/api/v1/machines/stops",
        "/api/v1/readings",
        "/api/v1/readings?hours=6",
        "/api/v1/anomalies",
        "/api/v1/anomalies?hours=12",
        "/api/v1/monitoring/stop/status",
        "/api/v1/monitoring/anomaly/status",
    ];

    for endpoint in &endpoints {
        let (status, json) = call(&state, "GET", endpoint, None).await;
        assert_eq!(status, StatusCode::OK, "GET {endpoint} returned status {status}");
        assert!(json.get("data").is_some(), "GET {endpoint} missing data");
        assert_eq!(json["meta"]["version"], "1");
    }
}

#[tokio::test]
async fn test_health_reports_components() {
    let (status, json) = call(&demo_state(), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["store"], "memory");
    assert_eq!(json["data"]["scorer"], "threshold");
    assert_eq!(json["data"]["notifier"], "log");
    assert_eq!(json["data"]["monitors"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_machine_status_lists_configured_machines() {
    let (_, json) = call(&demo_state(), "GET", "/api/v1/machines/status", None).await;
    let machines = json["data"]["machines"].as_array().unwrap();
    assert_eq!(machines.len(), 7);
    assert_eq!(machines[0]["machine_id"], "G19");
    // Demo machine #1 is stopped, #4 has an offline meter.
    assert_eq!(machines[1]["state"], "stopped");
    assert_eq!(machines[4]["state"], "disconnected");
}

#[tokio::test]
async fn test_stops_include_open_interval() {
    let (_, json) = call(&demo_state(), "GET", "/api/v1/machines/stops", None).await;
    let stops = json["data"].as_array().unwrap();
    assert!(stops
        .iter()
        .any(|s| s["machine_id"] == "G26" && s["end"] == "open"));
}

#[tokio::test]
async fn test_anomalies_summary_shape() {
    let (_, json) = call(&demo_state(), "GET", "/api/v1/anomalies?hours=24", None).await;
    let summary = &json["data"]["summary"];
    assert_eq!(summary["machines_count"], 7);
    assert!(summary["anomalies_found"].is_boolean());
    assert_eq!(json["data"]["machines"]["G19"]["status"], "success");
}

#[tokio::test]
async fn test_invalid_hours_rejected() {
    let state = demo_state();
    let (status, json) = call(&state, "GET", "/api/v1/anomalies?hours=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");

    let (status, _) = call(&state, "GET", "/api/v1/readings?hours=100000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_store_is_service_unavailable() {
    let state = create_test_state(Vec::new());
    let (status, json) = call(&state, "GET", "/api/v1/machines/status", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "DATA_UNAVAILABLE");
}

#[tokio::test]
async fn test_monitoring_lifecycle() {
    let state = demo_state();
    let body = Some(json!({"interval_minutes": 60}));

    let (status, json) = call(&state, "POST", "/api/v1/monitoring/stop/start", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["result"], "started");
    assert_eq!(json["data"]["monitor"]["interval_secs"], 3600);

    let (_, json) = call(&state, "POST", "/api/v1/monitoring/stop/start", body).await;
    assert_eq!(json["data"]["result"], "already_running");

    let (_, json) = call(&state, "GET", "/api/v1/monitoring/stop/status", None).await;
    assert_eq!(json["data"]["status"], "active");

    let (_, json) = call(&state, "POST", "/api/v1/monitoring/stop/stop", None).await;
    assert_eq!(json["data"]["result"], "stopping");

    let (_, json) = call(&state, "GET", "/api/v1/monitoring/stop/status", None).await;
    assert_eq!(json["data"]["status"], "inactive");

    let (_, json) = call(&state, "POST", "/api/v1/monitoring/stop/stop", None).await;
    assert_eq!(json["data"]["result"], "not_running");

    state.scheduler.shutdown().await;
}

#[tokio::test]
async fn test_start_without_body_uses_config_interval() {
    let state = demo_state();
    let (status, json) = call(&state, "POST", "/api/v1/monitoring/anomaly/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["monitor"]["interval_secs"], 3600);
    state.scheduler.shutdown().await;
}

#[tokio::test]
async fn test_monitoring_bad_requests() {
    let state = demo_state();
    let (status, _) = call(&state, "GET", "/api/v1/monitoring/pressure/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &state,
        "POST",
        "/api/v1/monitoring/stop/start",
        Some(json!({"interval_minutes": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_interval_rejected() {
    let state = demo_state();

    for minutes in [u64::MAX / 60 + 2, u64::MAX, 7 * 24 * 60 + 1] {
        let (status, json) = call(
            &state,
            "POST",
            "/api/v1/monitoring/stop/start",
            Some(json!({ "interval_minutes": minutes })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "interval_minutes = {minutes}");
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    let (_, json) = call(&state, "GET", "/api/v1/monitoring/stop/status", None).await;
    assert_eq!(json["data"]["status"], "inactive");

    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/monitoring/stop/start",
        Some(json!({ "interval_minutes": 7 * 24 * 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["monitor"]["interval_secs"], 7 * 24 * 3600);
    state.scheduler.shutdown().await;
}

#[tokio::test]
async fn test_send_alert() {
    let state = demo_state();

    let (status, _) = call(
        &state,
        "POST",
        "/api/v1/alerts/send",
        Some(json!({"machine": "G19", "anomalies": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let event = json!({
        "machine_id": "G19",
        "timestamp": "2025-03-01T06:30:00Z",
        "value": 135.0,
        "lower_bound": 70.0,
        "upper_bound": 130.0,
        "mean": 100.0
    });
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/alerts/send",
        Some(json!({"machine": "G19", "anomalies": [event]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["anomalies"], 1);
    assert!(json["data"]["subject"].as_str().unwrap().contains("G19"));
}
