//! The rental chain: `/rent` verifies through `/check` and counts successful chains.

pub mod error;
pub mod handlers;

pub use error::*;
pub use handlers::*;

use crate::telemetry::RequestTracer;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Path of the chain-initiating endpoint.
pub const RENT_PATH: &str = "/rent";

/// Path of the terminal verification endpoint.
pub const CHECK_PATH: &str = "/check";

/// Router of the business-logic runtime: `/rent` and `/check`.
pub fn router(state: RentalState) -> Router {
    Router::new()
        .route(RENT_PATH, get(handlers::rent))
        .route(CHECK_PATH, get(handlers::check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router of a standalone verification runtime: `/check` only.
pub fn verify_router(tracer: RequestTracer) -> Router {
    Router::new()
        .route(CHECK_PATH, get(handlers::check))
        .layer(TraceLayer::new_for_http())
        .with_state(tracer)
}
