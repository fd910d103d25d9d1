//! # Observability & Tracing
//!
//! This module initializes the `tracing` subscriber for the whole process.
//!
//! ## Overview
//!
//! [`setup_tracing`] installs a subscriber filtered by `RUST_LOG` with two layers:
//!
//! - a `fmt` layer printing events and span close events, so every request span (`rent`,
//!   `check`) shows up once with its timing and its `trace_id` / `span_id` fields
//! - a `tracing-opentelemetry` layer feeding this crate's spans to the [`RequestTracer`], whose
//!   provider writes every finished OpenTelemetry span to stdout
//!
//! The handlers parent their `tracing` span on the request's server span, so both show up in
//! the same OpenTelemetry trace.
//!
//! ## Configuration
//!
//! - `RUST_LOG` - filter directives, default `observability_recipe=info,tower_http=info`
//! - `LOG_FORMAT=json` - one JSON object per line instead of the compact format
//!
//! ## Usage Examples
//!
//! ```bash
//! # Compact logs (default)
//! PORT=8080 DIAG_PORT=8081 cargo run
//!
//! # Debug logs, including the ids sent on the outbound call
//! RUST_LOG=observability_recipe=debug PORT=8080 DIAG_PORT=8081 cargo run
//!
//! # JSON lines for a log shipper
//! LOG_FORMAT=json PORT=8080 DIAG_PORT=8081 cargo run
//! ```
//!
//! ## Chained Call Trace Example
//!
//! One `GET /rent` produces two spans sharing one `trace_id`:
//!
//! ```text
//! INFO rent: Received a call handle="rent" trace_id=4bf9...4736 span_id=a1b2...
//! INFO check: Received a call parent_span_id="a1b2..." handle="check" trace_id=4bf9...4736
//! INFO rent: Verification passed status=200 OK
//! ```

use crate::telemetry::RequestTracer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "observability_recipe=info,tower_http=info";
const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub fn setup_tracing(tracer: &RequestTracer) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false) // Runtime and handler names are already fields
            .compact()
            .boxed()
    };

    // Only this crate's spans become OpenTelemetry spans
    let otel_layer = tracing_opentelemetry::layer()
        .with_tracer(tracer.tracer().clone())
        .with_filter(filter_fn(|metadata| {
            metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
        }));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();
}
