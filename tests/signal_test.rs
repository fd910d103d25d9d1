//! Raises real signals at this process, so it lives in its own test binary.
#![cfg(unix)]

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use nix::sys::signal::{raise, Signal};
use observability_recipe::lifecycle::{
    RuntimeSpec, ShutdownReason, ShutdownSignal, Supervisor, SupervisorState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;

const BUDGET: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_registered_signals_name_and_drain() {
    let mut signals = ShutdownSignal::register().expect("Failed to register signal handlers");

    raise(Signal::SIGTERM).unwrap();
    assert_eq!(timeout(BUDGET, signals.recv()).await.unwrap(), "SIGTERM");

    raise(Signal::SIGINT).unwrap();
    assert_eq!(timeout(BUDGET, signals.recv()).await.unwrap(), "SIGINT");

    let router = Router::new().route("/ping", get(|| async { StatusCode::OK }));
    let mut supervisor = Supervisor::start(vec![RuntimeSpec::new(
        "bl",
        SocketAddr::from(([127, 0, 0, 1], 0)),
        router,
    )])
    .await
    .unwrap();

    raise(Signal::SIGTERM).unwrap();
    let (reason, report) = supervisor.run_until(signals.recv(), BUDGET).await;

    assert!(matches!(reason, ShutdownReason::Signal("SIGTERM")));
    assert!(report.is_clean());
    assert_eq!(report.drained, vec!["bl"]);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}
