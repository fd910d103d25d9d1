//! Observability recipe daemon
//!
//! Runs the business-logic and diagnostics runtimes under one supervisor until a
//! termination signal arrives or one of them fails.

use anyhow::Context;
use observability_recipe::config::{Config, ConfigError};
use observability_recipe::lifecycle::{
    runtime_specs, setup_tracing, ShutdownReason, ShutdownSignal, Supervisor, SERVICE_NAME,
};
use observability_recipe::telemetry::{stdout_tracer_provider, Metrics, RequestTracer};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let tracer = RequestTracer::new(stdout_tracer_provider(SERVICE_NAME));
    setup_tracing(&tracer);
    info!(version = env!("CARGO_PKG_VERSION"), "The application is starting...");

    info!("Reading configuration...");
    let config = match Config::load() {
        Ok(config) => config,
        // Help, version and usage errors print themselves and pick the exit code
        Err(ConfigError::Cli(e)) => {
            if e.use_stderr() {
                error!(kind = ?e.kind(), "Invalid configuration");
            }
            e.exit()
        }
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(?config, "Configuration is ready...");

    // Registered before any runtime exists, so a failure here leaves nothing to drain
    let mut signals = ShutdownSignal::register().context("registering signal handlers")?;

    let metrics = Metrics::new().context("registering metrics")?;
    let specs = runtime_specs(&config, &metrics, &tracer)?;
    let mut supervisor = Supervisor::start(specs).await?;
    info!(runtimes = ?supervisor.runtime_names(), "Servers are ready");

    let (reason, report) = supervisor
        .run_until(signals.recv(), config.shutdown_budget())
        .await;

    for failure in &report.failures {
        warn!(runtime = failure.runtime(), error = %failure, "Runtime was not drained cleanly");
    }
    for result in tracer.provider().force_flush() {
        if let Err(e) = result {
            warn!(error = %e, "Failed to flush spans");
        }
    }
    info!(drained = ?report.drained, "The application is stopped");

    match reason {
        ShutdownReason::Signal(_) => Ok(()),
        ShutdownReason::Failure(failure) => {
            Err(anyhow::Error::new(failure).context("a runtime failed while serving"))
        }
    }
}
