//! Route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Produced interfaces
        .route("/machines/status", get(handlers::machine_status))
        .route("/machines/stops", get(handlers::machine_stops))
        .route("/readings", get(handlers::readings))
        .route("/anomalies", get(handlers::anomalies))
        // Monitor lifecycle
        .route("/monitoring/:kind/start", post(handlers::start_monitoring))
        .route("/monitoring/:kind/stop", post(handlers::stop_monitoring))
        .route("/monitoring/:kind/status", get(handlers::monitoring_status))
        // Operator re-trigger
        .route("/alerts/send", post(handlers::send_alert))
        .with_state(state)
}
