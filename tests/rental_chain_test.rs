use axum::http::StatusCode;
use futures::future::join_all;
use observability_recipe::clients::VerifyClient;
use observability_recipe::framework::mock::MockEndpoint;
use observability_recipe::framework::{FailureChannel, ServiceRuntime};
use observability_recipe::rental::{self, RentalState, RENT_PATH};
use observability_recipe::telemetry::{
    tracer_provider, Metrics, RequestCounter, RequestTracer, TRACEPARENT, TRACESTATE,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

const INBOUND_TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
const INBOUND_TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
const INBOUND_SPAN_ID: &str = "00f067aa0ba902b7";

/// A business runtime whose `/rent` calls `/check` at `verify_base_url`.
struct Chain {
    runtime: ServiceRuntime,
    counter: RequestCounter,
    _failures: FailureChannel,
}

impl Chain {
    async fn start(verify_base_url: String) -> Self {
        Self::start_with_timeout(verify_base_url, Duration::from_secs(2)).await
    }

    async fn start_with_timeout(verify_base_url: String, timeout: Duration) -> Self {
        let metrics = Metrics::new().unwrap();
        let counter = metrics.rent_requests().clone();
        let verify = VerifyClient::new(verify_base_url, timeout).unwrap();
        let router = rental::router(RentalState::new(verify, counter.clone(), tracer()));

        let (failures, sender) = FailureChannel::new(1);
        let runtime = ServiceRuntime::start("bl", loopback(), router, sender)
            .await
            .expect("Failed to start business runtime");

        Self {
            runtime,
            counter,
            _failures: failures,
        }
    }

    fn rent_url(&self) -> String {
        format!("http://{}{}", self.runtime.local_addr(), RENT_PATH)
    }

    async fn stop(&mut self) {
        self.runtime
            .shutdown(Instant::now() + Duration::from_secs(5))
            .await
            .expect("Business runtime did not stop cleanly");
    }
}

fn tracer() -> RequestTracer {
    RequestTracer::new(tracer_provider("test"))
}

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

async fn rent(url: &str) -> u16 {
    reqwest::get(url)
        .await
        .expect("Failed to call /rent")
        .status()
        .as_u16()
}

#[tokio::test]
async fn test_successful_chain_is_counted_once() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check().return_ok();
    let mut chain = Chain::start(mock.base_url()).await;

    assert_eq!(rent(&chain.rent_url()).await, 200);
    assert_eq!(chain.counter.value(), 1);
    assert_eq!(mock.call_count(), 1);

    mock.verify();
    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_non_success_status_is_mirrored_without_counting() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check()
        .return_status(StatusCode::SERVICE_UNAVAILABLE);
    let mut chain = Chain::start(mock.base_url()).await;

    assert_eq!(rent(&chain.rent_url()).await, 503);
    assert_eq!(chain.counter.value(), 0);

    mock.verify();
    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_unreachable_dependency_yields_500() {
    let mut mock = MockEndpoint::start().await.unwrap();
    let base_url = mock.base_url();
    mock.stop().await;
    let mut chain = Chain::start(base_url).await;

    assert_eq!(rent(&chain.rent_url()).await, 500);
    assert_eq!(chain.counter.value(), 0);

    chain.stop().await;
}

#[tokio::test]
async fn test_outbound_call_continues_inbound_trace() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check().return_ok();
    let mut chain = Chain::start(mock.base_url()).await;

    let response = reqwest::Client::new()
        .get(chain.rent_url())
        .header(TRACEPARENT, INBOUND_TRACEPARENT)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    let propagated = calls[0]
        .span_context()
        .expect("Outbound call carried no valid traceparent");

    assert_eq!(propagated.trace_id().to_string(), INBOUND_TRACE_ID);
    assert_ne!(propagated.span_id().to_string(), INBOUND_SPAN_ID);
    assert!(propagated.is_sampled());

    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_root_trace_is_started_without_inbound_context() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check().times(2).return_ok();
    let mut chain = Chain::start(mock.base_url()).await;

    assert_eq!(rent(&chain.rent_url()).await, 200);
    assert_eq!(rent(&chain.rent_url()).await, 200);

    let trace_ids: Vec<_> = mock
        .calls()
        .iter()
        .map(|call| call.span_context().unwrap().trace_id())
        .collect();
    assert_eq!(trace_ids.len(), 2);
    assert_ne!(trace_ids[0], trace_ids[1]);

    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_tracestate_is_forwarded() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check().return_ok();
    let mut chain = Chain::start(mock.base_url()).await;

    let response = reqwest::Client::new()
        .get(chain.rent_url())
        .header(TRACEPARENT, INBOUND_TRACEPARENT)
        .header(TRACESTATE, "vendor=abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = mock.calls();
    assert_eq!(calls[0].tracestate.as_deref(), Some("vendor=abc"));

    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_redirect_is_mirrored_not_followed() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check().return_status(StatusCode::FOUND);
    let mut chain = Chain::start(mock.base_url()).await;

    let response = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
        .get(chain.rent_url())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(mock.call_count(), 1);
    assert_eq!(chain.counter.value(), 0);
    mock.verify();

    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_slow_dependency_times_out_without_retry() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check()
        .delay(Duration::from_secs(1))
        .return_ok();
    let mut chain = Chain::start_with_timeout(mock.base_url(), Duration::from_millis(200)).await;

    let started = Instant::now();
    assert_eq!(rent(&chain.rent_url()).await, 500);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(chain.counter.value(), 0);
    assert_eq!(mock.call_count(), 1);
    mock.verify();

    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_concurrent_chains_are_all_counted() {
    let mut mock = MockEndpoint::start().await.unwrap();
    mock.expect_check().times(100).return_ok();
    let mut chain = Chain::start(mock.base_url()).await;

    let url = chain.rent_url();
    let client = reqwest::Client::new();
    let statuses = join_all((0..100).map(|_| {
        let request = client.get(&url);
        async move { request.send().await.unwrap().status().as_u16() }
    }))
    .await;

    assert!(statuses.iter().all(|&status| status == 200));
    assert_eq!(chain.counter.value(), 100);
    mock.verify();

    chain.stop().await;
    mock.stop().await;
}

#[tokio::test]
async fn test_chain_fails_once_verification_runtime_stops() {
    let (_verify_failures, sender) = FailureChannel::new(1);
    let mut verify = ServiceRuntime::start("verify", loopback(), rental::verify_router(tracer()), sender)
        .await
        .unwrap();
    let mut chain = Chain::start(format!("http://{}", verify.local_addr())).await;

    assert_eq!(rent(&chain.rent_url()).await, 200);
    assert_eq!(chain.counter.value(), 1);

    verify
        .shutdown(Instant::now() + Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(rent(&chain.rent_url()).await, 500);
    assert_eq!(chain.counter.value(), 1);

    chain.stop().await;
}
