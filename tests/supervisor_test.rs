use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use observability_recipe::config::Config;
use observability_recipe::diagnostics::{HealthReport, HEALTH_PATH, METRICS_PATH};
use observability_recipe::framework::RuntimeError;
use observability_recipe::lifecycle::{
    runtime_specs, RuntimeSpec, ShutdownReason, Supervisor, SupervisorError, SupervisorState,
    BUSINESS_RUNTIME, DIAGNOSTICS_RUNTIME, SERVICE_NAME,
};
use observability_recipe::rental::RENT_PATH;
use observability_recipe::telemetry::{tracer_provider, Metrics, RequestTracer, RENT_REQUESTS_TOTAL};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

const BUDGET: Duration = Duration::from_secs(5);

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn ping_router() -> Router {
    Router::new().route("/ping", get(|| async { StatusCode::OK }))
}

/// A port that was free a moment ago.
fn free_port() -> u16 {
    TcpListener::bind(loopback())
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn start_pair() -> Supervisor {
    Supervisor::start(vec![
        RuntimeSpec::new("bl", loopback(), ping_router()),
        RuntimeSpec::new("diag", loopback(), ping_router()),
    ])
    .await
    .expect("Failed to start runtimes")
}

#[tokio::test]
async fn test_every_runtime_serves_after_start() {
    let mut supervisor = start_pair().await;
    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert_eq!(supervisor.runtime_names(), vec!["bl", "diag"]);

    for name in ["bl", "diag"] {
        let addr = supervisor.local_addr(name).unwrap();
        let response = reqwest::get(format!("http://{addr}/ping")).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let report = supervisor.drain(BUDGET).await;
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_startup_is_all_or_nothing() {
    let first_addr = SocketAddr::from(([127, 0, 0, 1], free_port()));
    let occupied = TcpListener::bind(loopback()).unwrap();
    let occupied_addr = occupied.local_addr().unwrap();

    let result = Supervisor::start(vec![
        RuntimeSpec::new("bl", first_addr, ping_router()),
        RuntimeSpec::new("diag", occupied_addr, ping_router()),
    ])
    .await;

    match result {
        Err(SupervisorError::Startup(RuntimeError::Bind { name, addr, .. })) => {
            assert_eq!(name, "diag");
            assert_eq!(addr, occupied_addr);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("startup should have failed"),
    }

    // The runtime started before the failure has released its listener.
    assert!(TcpListener::bind(first_addr).is_ok());
}

#[tokio::test]
async fn test_signal_drains_every_runtime_once() {
    let mut supervisor = start_pair().await;

    let (reason, report) = supervisor.run_until(async { "SIGTERM" }, BUDGET).await;

    assert!(matches!(reason, ShutdownReason::Signal("SIGTERM")));
    assert!(report.is_clean());
    let mut drained = report.drained.clone();
    drained.sort();
    assert_eq!(drained, vec!["bl", "diag"]);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);

    let addr = supervisor.local_addr("bl").unwrap();
    assert!(reqwest::get(format!("http://{addr}/ping")).await.is_err());
}

#[tokio::test]
async fn test_first_failure_triggers_shutdown() {
    let mut supervisor = start_pair().await;
    let sender = supervisor.failure_sender();

    assert!(sender.report(RuntimeError::Crashed {
        name: "bl".to_string(),
        reason: "injected".to_string(),
    }));
    assert!(sender.report(RuntimeError::Crashed {
        name: "diag".to_string(),
        reason: "second".to_string(),
    }));

    let (reason, report) = supervisor
        .run_until(std::future::pending(), BUDGET)
        .await;

    match reason {
        ShutdownReason::Failure(failure) => {
            assert_eq!(failure.runtime(), "bl");
            assert!(failure.to_string().contains("injected"));
        }
        other => panic!("unexpected reason: {other:?}"),
    }
    assert_eq!(report.drained.len(), 2);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);

    // The channel is closed once shutdown has begun.
    assert!(!sender.report(RuntimeError::Crashed {
        name: "bl".to_string(),
        reason: "late".to_string(),
    }));
}

#[tokio::test]
async fn test_second_drain_is_a_noop() {
    let mut supervisor = start_pair().await;

    let first = supervisor.drain(BUDGET).await;
    assert_eq!(first.drained.len(), 2);

    let second = supervisor.drain(BUDGET).await;
    assert!(second.drained.is_empty());
    assert!(second.failures.is_empty());
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn test_application_end_to_end() {
    let port = free_port();
    let diag_port = free_port();
    let config = Config::from_args([
        "app".to_string(),
        "--port".to_string(),
        port.to_string(),
        "--diag-port".to_string(),
        diag_port.to_string(),
        "--bind-host".to_string(),
        "127.0.0.1".to_string(),
    ])
    .unwrap();

    let metrics = Metrics::new().unwrap();
    let tracer = RequestTracer::new(tracer_provider(SERVICE_NAME));
    let specs = runtime_specs(&config, &metrics, &tracer).unwrap();
    let mut supervisor = Supervisor::start(specs).await.unwrap();
    assert_eq!(
        supervisor.runtime_names(),
        vec![BUSINESS_RUNTIME, DIAGNOSTICS_RUNTIME]
    );

    let rent = reqwest::get(format!("http://127.0.0.1:{port}{RENT_PATH}"))
        .await
        .unwrap();
    assert_eq!(rent.status().as_u16(), 200);
    assert_eq!(metrics.rent_requests().value(), 1);

    let health: HealthReport = reqwest::get(format!("http://127.0.0.1:{diag_port}{HEALTH_PATH}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.service, SERVICE_NAME);

    let exposition = reqwest::get(format!("http://127.0.0.1:{diag_port}{METRICS_PATH}"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(exposition.contains(&format!("{RENT_REQUESTS_TOTAL} 1")));

    let (reason, report) = supervisor.run_until(async { "SIGINT" }, BUDGET).await;
    assert!(matches!(reason, ShutdownReason::Signal("SIGINT")));
    assert!(report.is_clean());
}
