//! # Mock Framework
//!
//! Utilities for testing the handler chain against a scripted dependency.
//!
//! [`MockEndpoint`] runs a real [`ServiceRuntime`] on an ephemeral loopback port serving
//! `/check`. Queue the statuses it should answer with (optionally after a delay), point a
//! [`VerifyClient`](crate::clients::VerifyClient) at [`MockEndpoint::base_url`], and call
//! [`MockEndpoint::verify`] at the end to assert every expectation was consumed.

use crate::framework::{FailureChannel, RuntimeError, ServiceRuntime};
use crate::rental::CHECK_PATH;
use crate::telemetry::{TRACEPARENT, TRACESTATE};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// A request received by the mock, as seen on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub traceparent: Option<String>,
    pub tracestate: Option<String>,
}

impl RecordedCall {
    /// The remote span context the call carried, if its `traceparent` was valid.
    pub fn span_context(&self) -> Option<SpanContext> {
        let mut carrier = HashMap::new();
        if let Some(traceparent) = &self.traceparent {
            carrier.insert(TRACEPARENT.to_string(), traceparent.clone());
        }
        if let Some(tracestate) = &self.tracestate {
            carrier.insert(TRACESTATE.to_string(), tracestate.clone());
        }
        let cx = TraceContextPropagator::new().extract(&carrier);
        let span_context = cx.span().span_context().clone();
        span_context.is_valid().then_some(span_context)
    }
}

#[derive(Clone, Copy, Debug)]
struct Expectation {
    status: StatusCode,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
struct MockState {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    unexpected: Arc<Mutex<usize>>,
}

/// A scripted `/check` endpoint with expectation tracking.
///
/// # Example
/// ```ignore
/// let mut mock = MockEndpoint::start().await?;
/// mock.expect_check().return_ok();
/// mock.expect_check().times(2).return_status(StatusCode::SERVICE_UNAVAILABLE);
///
/// let client = VerifyClient::new(mock.base_url(), Duration::from_secs(1))?;
/// // Use client in tests...
/// mock.verify(); // Ensures all expectations were met
/// ```
///
/// A call arriving with no queued expectation is answered with `500` and makes
/// [`MockEndpoint::verify`] fail. A `3xx` answer carries `Location: /check`.
pub struct MockEndpoint {
    runtime: ServiceRuntime,
    state: MockState,
    _failures: FailureChannel,
}

impl MockEndpoint {
    /// Starts the mock on `127.0.0.1:0`.
    pub async fn start() -> Result<Self, RuntimeError> {
        let state = MockState::default();
        let router = Router::new()
            .route(CHECK_PATH, get(scripted_check))
            .with_state(state.clone());

        let (failures, sender) = FailureChannel::new(1);
        let runtime =
            ServiceRuntime::start("mock", SocketAddr::from(([127, 0, 0, 1], 0)), router, sender)
                .await?;

        Ok(Self {
            runtime,
            state,
            _failures: failures,
        })
    }

    /// `http://127.0.0.1:<port>` of the running mock.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.runtime.local_addr())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.runtime.local_addr()
    }

    /// Expects one or more `/check` calls.
    pub fn expect_check(&mut self) -> CheckExpectationBuilder {
        CheckExpectationBuilder {
            times: 1,
            delay: None,
            expectations: self.state.expectations.clone(),
        }
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    /// Verifies that all expectations were met and no unexpected call arrived.
    pub fn verify(&self) {
        let remaining = self.state.expectations.lock().unwrap().len();
        if remaining != 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
        let unexpected = *self.state.unexpected.lock().unwrap();
        if unexpected != 0 {
            panic!("Received {} unexpected /check calls", unexpected);
        }
    }

    /// Stops the mock so that further calls fail at the transport level.
    pub async fn stop(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        if let Err(e) = self.runtime.shutdown(deadline).await {
            panic!("Mock endpoint did not stop cleanly: {e}");
        }
    }
}

/// Builder for `/check` expectations.
pub struct CheckExpectationBuilder {
    times: usize,
    delay: Option<Duration>,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl CheckExpectationBuilder {
    /// Repeats the expectation `n` times.
    pub fn times(mut self, n: usize) -> Self {
        self.times = n;
        self
    }

    /// Holds each answer back for `delay`. The call is recorded on arrival.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answers with `200 OK`.
    pub fn return_ok(self) {
        self.return_status(StatusCode::OK);
    }

    /// Answers with `status`.
    pub fn return_status(self, status: StatusCode) {
        let mut exps = self.expectations.lock().unwrap();
        let expectation = Expectation {
            status,
            delay: self.delay,
        };
        exps.extend(std::iter::repeat(expectation).take(self.times));
    }
}

async fn scripted_check(State(state): State<MockState>, headers: HeaderMap) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    state.calls.lock().unwrap().push(RecordedCall {
        traceparent: header(TRACEPARENT),
        tracestate: header(TRACESTATE),
    });

    let next = state.expectations.lock().unwrap().pop_front();
    let Some(expectation) = next else {
        *state.unexpected.lock().unwrap() += 1;
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    if let Some(delay) = expectation.delay {
        tokio::time::sleep(delay).await;
    }
    if expectation.status.is_redirection() {
        return (expectation.status, [(header::LOCATION, CHECK_PATH)]).into_response();
    }
    expectation.status.into_response()
}
