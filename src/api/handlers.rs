//! API handlers.
//!
//! All handlers return `Response` via [`ApiResponse::ok`] or
//! [`ApiErrorResponse`].

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults;
use crate::engine::DetectionEngine;
use crate::monitoring::{MonitorError, MonitorKind, MonitorSnapshot, MonitoringScheduler, StartOutcome};
use crate::store::StoreError;
use crate::types::AnomalyEvent;

/// Upper bound on any `hours` query parameter (31 days).
const MAX_QUERY_HOURS: u64 = 24 * 31;

/// Upper bound on a monitor's polling interval (7 days).
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Shared state for every handler.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<DetectionEngine>,
    pub scheduler: Arc<MonitoringScheduler>,
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    #[serde(default)]
    pub hours: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartMonitoringRequest {
    #[serde(default)]
    pub interval_minutes: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SendAlertRequest {
    pub machine: String,
    #[serde(default)]
    pub anomalies: Vec<AnomalyEvent>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub plant: String,
    pub store: String,
    pub scorer: &'static str,
    pub notifier: &'static str,
    pub machines: usize,
    pub fingerprints: usize,
    pub monitors: Vec<MonitorSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct MonitoringActionResponse {
    pub kind: MonitorKind,
    /// "started", "already_running", "stopping" or "not_running"
    pub result: &'static str,
    pub monitor: MonitorSnapshot,
}

#[derive(Debug, Serialize)]
pub struct MonitoringStatusResponse {
    /// "active" or "inactive"
    pub status: &'static str,
    #[serde(flatten)]
    pub monitor: MonitorSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SendAlertResponse {
    pub machine: String,
    pub subject: String,
    pub recipient: String,
    pub anomalies: usize,
}

// ============================================================================
// Internal helpers
// ============================================================================

fn engine_error(e: MonitorError) -> Response {
    match e {
        MonitorError::Store(StoreError::DataUnavailable(msg)) => ApiErrorResponse::service_unavailable(msg),
        MonitorError::Store(other) => ApiErrorResponse::internal(other.to_string()),
        MonitorError::Notification(n) => ApiErrorResponse::bad_gateway(n.to_string()),
        MonitorError::InvalidRequest(msg) => ApiErrorResponse::bad_request(msg),
    }
}

fn parse_kind(raw: &str) -> Result<MonitorKind, Response> {
    raw.parse::<MonitorKind>().map_err(ApiErrorResponse::not_found)
}

fn hours_param(q: &HoursQuery, default: u64) -> Result<u64, Response> {
    match q.hours.unwrap_or(default) {
        0 => Err(ApiErrorResponse::bad_request("hours must be > 0")),
        h if h > MAX_QUERY_HOURS => Err(ApiErrorResponse::bad_request(format!(
            "hours must be <= {MAX_QUERY_HOURS}"
        ))),
        h => Ok(h),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn health(State(state): State<ApiState>) -> Response {
    let engine = &state.engine;
    ApiResponse::ok(HealthResponse {
        status: "ok",
        plant: engine.config().plant.name.clone(),
        store: engine.store_name().to_string(),
        scorer: engine.scorer_name(),
        notifier: engine.notifier_name(),
        machines: engine.config().machines().len(),
        fingerprints: engine.dedup().len(),
        monitors: MonitorKind::ALL
            .iter()
            .map(|k| state.scheduler.snapshot(*k))
            .collect(),
    })
}

/// GET /api/v1/machines/status
pub async fn machine_status(State(state): State<ApiState>) -> Response {
    match state.engine.machine_status().await {
        Ok(report) => ApiResponse::ok(report),
        Err(e) => engine_error(e),
    }
}

/// GET /api/v1/machines/stops
pub async fn machine_stops(State(state): State<ApiState>) -> Response {
    match state.engine.stop_intervals().await {
        Ok(stops) => ApiResponse::ok(stops),
        Err(e) => engine_error(e),
    }
}

/// GET /api/v1/readings?hours=24
pub async fn readings(State(state): State<ApiState>, Query(q): Query<HoursQuery>) -> Response {
    let hours = match hours_param(&q, 24) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match state.engine.readings(hours).await {
        Ok(readings) => ApiResponse::ok(readings),
        Err(e) => engine_error(e),
    }
}

/// GET /api/v1/anomalies?hours=48
pub async fn anomalies(State(state): State<ApiState>, Query(q): Query<HoursQuery>) -> Response {
    let hours = match hours_param(&q, defaults::ON_DEMAND_ANOMALY_WINDOW_HOURS) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match state.engine.detect_anomalies(hours).await {
        Ok(report) => ApiResponse::ok(report),
        Err(e) => engine_error(e),
    }
}

/// POST /api/v1/monitoring/:kind/start  `{"interval_minutes": 5}` (optional)
pub async fn start_monitoring(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    body: Option<Json<StartMonitoringRequest>>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let monitoring = &state.engine.config().monitoring;
    let interval = match body.and_then(|Json(b)| b.interval_minutes) {
        Some(0) => return ApiErrorResponse::bad_request("interval_minutes must be > 0"),
        Some(minutes) => match minutes.checked_mul(60) {
            Some(secs) if minutes <= MAX_INTERVAL_MINUTES => Duration::from_secs(secs),
            _ => {
                return ApiErrorResponse::bad_request(format!(
                    "interval_minutes must be <= {MAX_INTERVAL_MINUTES}"
                ))
            }
        },
        None => match kind {
            MonitorKind::Stop => monitoring.stop_interval(),
            MonitorKind::Anomaly => monitoring.anomaly_interval(),
        },
    };

    let result = match state.scheduler.start(kind, interval) {
        StartOutcome::Started => "started",
        StartOutcome::AlreadyRunning => "already_running",
    };
    ApiResponse::ok(MonitoringActionResponse {
        kind,
        result,
        monitor: state.scheduler.snapshot(kind),
    })
}

/// POST /api/v1/monitoring/:kind/stop
pub async fn stop_monitoring(State(state): State<ApiState>, Path(kind): Path<String>) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let result = if state.scheduler.stop(kind) {
        "stopping"
    } else {
        "not_running"
    };
    ApiResponse::ok(MonitoringActionResponse {
        kind,
        result,
        monitor: state.scheduler.snapshot(kind),
    })
}

/// GET /api/v1/monitoring/:kind/status
pub async fn monitoring_status(State(state): State<ApiState>, Path(kind): Path<String>) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let monitor = state.scheduler.snapshot(kind);
    ApiResponse::ok(MonitoringStatusResponse {
        status: if monitor.active { "active" } else { "inactive" },
        monitor,
    })
}

/// POST /api/v1/alerts/send  `{"machine": "G19", "anomalies": [...]}`
pub async fn send_alert(State(state): State<ApiState>, Json(req): Json<SendAlertRequest>) -> Response {
    match state
        .engine
        .send_manual_alert(&req.machine, &req.anomalies, Utc::now())
        .await
    {
        Ok(payload) => ApiResponse::ok(SendAlertResponse {
            machine: req.machine,
            subject: payload.subject,
            recipient: payload.recipient,
            anomalies: req.anomalies.len(),
        }),
        Err(e) => engine_error(e),
    }
}
