//! Handlers for the business-logic runtime.

use crate::clients::VerifyClient;
use crate::telemetry::{RequestCounter, RequestTracer, TraceContext};
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use tracing::{info, instrument, warn, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Shared state of the `/rent` handler.
///
/// Every field is a cheap clone around shared, concurrency-safe internals, so one
/// `RentalState` serves every concurrently handled request.
#[derive(Clone, Debug)]
pub struct RentalState {
    pub verify: VerifyClient,
    pub counter: RequestCounter,
    pub tracer: RequestTracer,
}

impl RentalState {
    pub fn new(verify: VerifyClient, counter: RequestCounter, tracer: RequestTracer) -> Self {
        Self {
            verify,
            counter,
            tracer,
        }
    }
}

impl FromRef<RentalState> for RequestTracer {
    fn from_ref(state: &RentalState) -> Self {
        state.tracer.clone()
    }
}

/// `GET /rent`: calls `/check` once with the inbound trace context and mirrors its status.
///
/// The counter moves only after a successful response was observed, never on dispatch and
/// never on failure.
#[instrument(
    name = "rent",
    skip_all,
    fields(handle = "rent", trace_id = %trace.trace_id(), span_id = %trace.span_id())
)]
pub async fn rent(State(state): State<RentalState>, trace: TraceContext) -> StatusCode {
    Span::current().set_parent(trace.context().clone());
    info!("Received a call");

    let status = match state.verify.check(&trace).await {
        Ok(status) => {
            state.counter.increment();
            info!(%status, "Verification passed");
            status
        }
        Err(e) => {
            warn!(error = %e, "Verification failed");
            e.status_code()
        }
    };

    trace.finish(status);
    status
}

/// `GET /check`: the terminal hop of the chain. Always succeeds.
#[instrument(
    name = "check",
    skip_all,
    fields(handle = "check", trace_id = %trace.trace_id(), span_id = %trace.span_id())
)]
pub async fn check(trace: TraceContext) -> StatusCode {
    Span::current().set_parent(trace.context().clone());
    info!(parent_span_id = ?trace.parent_span_id(), "Received a call");

    trace.finish(StatusCode::OK);
    StatusCode::OK
}
