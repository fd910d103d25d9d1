//! # Diagnostics Runtime
//!
//! Endpoints served on the diagnostics port:
//!
//! - `GET /health` - always `200`, with a small JSON body naming the service
//! - `GET /metrics` - the Prometheus text exposition of [`Metrics`]

use crate::telemetry::Metrics;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Clone)]
struct DiagnosticsState {
    service: &'static str,
    metrics: Metrics,
}

/// Router of the diagnostics runtime.
pub fn router(service: &'static str, metrics: Metrics) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(METRICS_PATH, get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(DiagnosticsState { service, metrics })
}

async fn health(State(state): State<DiagnosticsState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok".to_string(),
        service: state.service.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn render_metrics(State(state): State<DiagnosticsState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
