//! # Request Tracer
//!
//! OpenTelemetry tracer provider and the handle handlers use to open server spans.
//!
//! Every span is sampled. The process-wide provider built by [`stdout_tracer_provider`]
//! writes each finished span to standard output; [`tracer_provider`] records spans without
//! exporting them, which is what the tests use.

use crate::telemetry::context::{HeaderExtractor, TraceContext, TRACEPARENT};
use axum::http::HeaderMap;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer as _, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Config, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use std::borrow::Cow;
use std::fmt;
use tracing::debug;

/// Instrumentation scope reported with every span.
const INSTRUMENTATION_SCOPE: &str = env!("CARGO_PKG_NAME");

fn provider_config(service: &'static str) -> Config {
    Config::default()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(Resource::new(vec![KeyValue::new("service.name", service)]))
}

/// A provider that records spans for `service` without exporting them.
pub fn tracer_provider(service: &'static str) -> TracerProvider {
    TracerProvider::builder()
        .with_config(provider_config(service))
        .build()
}

/// A provider that writes every finished span for `service` to stdout.
pub fn stdout_tracer_provider(service: &'static str) -> TracerProvider {
    TracerProvider::builder()
        .with_config(provider_config(service))
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build()
}

/// Opens server spans for inbound requests.
///
/// Holds the provider as well as the tracer: a tracer only keeps a weak reference to its
/// provider and stops recording once the provider is gone.
#[derive(Clone)]
pub struct RequestTracer {
    provider: TracerProvider,
    tracer: Tracer,
}

impl RequestTracer {
    pub fn new(provider: TracerProvider) -> Self {
        let tracer = provider.tracer(INSTRUMENTATION_SCOPE);
        Self { provider, tracer }
    }

    pub fn provider(&self) -> &TracerProvider {
        &self.provider
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Starts a server span named `name`.
    ///
    /// The span continues the caller's trace when `headers` carry a valid `traceparent`, and
    /// starts a new trace otherwise. A malformed header is logged and ignored.
    pub fn start_server_span(
        &self,
        name: impl Into<Cow<'static, str>>,
        headers: &HeaderMap,
    ) -> TraceContext {
        let parent = TraceContextPropagator::new().extract(&HeaderExtractor(headers));
        let remote = parent.span().span_context().clone();

        let parent_span_id = if remote.is_valid() {
            Some(remote.span_id())
        } else {
            if let Some(raw) = headers.get(TRACEPARENT) {
                debug!(traceparent = ?raw, "Ignoring malformed traceparent");
            }
            None
        };

        let builder = self.tracer.span_builder(name).with_kind(SpanKind::Server);
        let span = self.tracer.build_with_context(builder, &parent);
        TraceContext::new(parent.with_span(span), parent_span_id)
    }
}

impl fmt::Debug for RequestTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTracer")
            .field("scope", &INSTRUMENTATION_SCOPE)
            .finish_non_exhaustive()
    }
}
