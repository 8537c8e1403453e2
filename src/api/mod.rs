//! HTTP adapter.
//!
//! A thin axum router over [`DetectionEngine`](crate::engine::DetectionEngine)
//! and [`MonitoringScheduler`](crate::monitoring::MonitoringScheduler). All
//! routes live under `/api/v1` and answer with the [`envelope`] shapes.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// CORS: same-origin unless `PLANTWATCH_CORS_ORIGINS` lists allowed origins
/// (comma-separated, e.g. `http://localhost:4200` for a dashboard dev server).
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var("PLANTWATCH_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
