//! # Trace Context
//!
//! The OpenTelemetry context of one request, carried explicitly from the handler to the
//! dependent call it makes.
//!
//! A [`TraceContext`] is created once when a request enters a runtime (see the
//! [`FromRequestParts`] impl below) and is then passed *by reference* to whatever issues
//! the dependent call. It is never attached to the thread-local "current" context, so the
//! same context is observed no matter which worker thread polls the handler.
//!
//! Headers travel in the W3C Trace Context format, read and written by
//! [`TraceContextPropagator`]:
//!
//! ```text
//! traceparent: 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//!              ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^ ^^
//!         version           trace-id                  parent-id    flags
//! ```

use crate::telemetry::tracer::RequestTracer;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts, MatchedPath};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanId, Status, TraceContextExt, TraceId};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::collections::HashMap;
use std::convert::Infallible;

/// Header carrying the trace id, the caller's span id and the flags.
pub const TRACEPARENT: &str = "traceparent";

/// Header carrying vendor-specific state; forwarded untouched.
pub const TRACESTATE: &str = "tracestate";

/// Read-only view of inbound headers for the propagator.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// The server span of one request, inside the trace it belongs to.
#[derive(Clone, Debug)]
pub struct TraceContext {
    cx: Context,
    parent_span_id: Option<SpanId>,
}

impl TraceContext {
    pub(crate) fn new(cx: Context, parent_span_id: Option<SpanId>) -> Self {
        Self { cx, parent_span_id }
    }

    /// The OpenTelemetry context whose active span is this request's server span.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn trace_id(&self) -> TraceId {
        self.cx.span().span_context().trace_id()
    }

    pub fn span_id(&self) -> SpanId {
        self.cx.span().span_context().span_id()
    }

    /// Span id of the remote caller, when the request continued an existing trace.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    pub fn is_sampled(&self) -> bool {
        self.cx.span().span_context().is_sampled()
    }

    /// Writes `traceparent` and `tracestate` into `carrier`, so the callee continues this
    /// trace as a child of this span.
    pub fn inject(&self, carrier: &mut dyn Injector) {
        TraceContextPropagator::new().inject_context(&self.cx, carrier);
    }

    /// Header pairs to attach to an outbound request. Empty values are left out.
    pub fn propagation_headers(&self) -> HashMap<String, String> {
        let mut carrier = HashMap::new();
        self.inject(&mut carrier);
        carrier.retain(|_, value| !value.is_empty());
        carrier
    }

    /// Records the response status on the server span and ends it.
    pub fn finish(&self, status: StatusCode) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new(
            "http.response.status_code",
            i64::from(status.as_u16()),
        ));
        if status.is_server_error() {
            span.set_status(Status::Error {
                description: status.to_string().into(),
            });
        }
        span.end();
    }
}

/// Opens the server span of the request being extracted.
///
/// The span is named after the method and the matched route (`GET /rent`), and the tracer is
/// taken from the router state.
#[async_trait]
impl<S> FromRequestParts<S> for TraceContext
where
    S: Send + Sync,
    RequestTracer: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let name = match parts.extensions.get::<MatchedPath>() {
            Some(path) => format!("{} {}", parts.method, path.as_str()),
            None => parts.method.to_string(),
        };
        Ok(RequestTracer::from_ref(state).start_server_span(name, &parts.headers))
    }
}
