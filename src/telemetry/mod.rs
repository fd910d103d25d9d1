//! Tracing and metrics capabilities consumed by the handlers.
//!
//! - [`RequestTracer`] - OpenTelemetry tracer that opens one server span per request
//! - [`TraceContext`] - that span's context, extracted per request and passed explicitly
//! - [`Metrics`] / [`RequestCounter`] - prometheus-backed counters and their exposition

pub mod context;
pub mod metrics;
pub mod tracer;

pub use context::*;
pub use metrics::*;
pub use tracer::*;
