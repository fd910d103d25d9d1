use crate::framework::{FailureChannel, FailureSender, RuntimeError, ServiceRuntime};
use crate::telemetry::MetricsError;
use axum::Router;
use futures::future::join_all;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Time given to already-started runtimes when a later one fails to bind.
const ROLLBACK_BUDGET: Duration = Duration::from_secs(1);

/// Errors that abort the supervisor before it reaches `Running`.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("startup aborted: {0}")]
    Startup(#[from] RuntimeError),

    #[error("metrics setup failed: {0}")]
    Metrics(#[from] MetricsError),

    #[error("outbound HTTP client could not be built: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Everything needed to start one runtime.
pub struct RuntimeSpec {
    pub name: String,
    pub bind_addr: SocketAddr,
    pub router: Router,
}

impl RuntimeSpec {
    pub fn new(name: impl Into<String>, bind_addr: SocketAddr, router: Router) -> Self {
        Self {
            name: name.into(),
            bind_addr,
            router,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Draining,
    Stopped,
}

/// Why the supervisor left `Running`.
#[derive(Debug)]
pub enum ShutdownReason {
    /// An operator signal, by name (`SIGINT`, `SIGTERM`).
    Signal(&'static str),
    /// The first failure reported by a runtime.
    Failure(RuntimeError),
}

/// Outcome of draining every runtime.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Runtimes that stopped cleanly within the deadline.
    pub drained: Vec<String>,
    /// Runtimes that did not, one error each.
    pub failures: Vec<RuntimeError>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The top-level orchestrator of the co-located runtimes.
///
/// `Supervisor` is responsible for:
/// - **Startup**: Starting every runtime in order, all or nothing
/// - **Watching**: Waiting for an operator signal or the first runtime failure
/// - **Draining**: Stopping every runtime against one shared deadline
///
/// # States
///
/// `Starting → Running → Draining → Stopped`
///
/// # Example
///
/// ```ignore
/// let mut supervisor = Supervisor::start(specs).await?;
/// let mut signals = ShutdownSignal::register()?;
///
/// let (reason, report) = supervisor
///     .run_until(signals.recv(), Duration::from_secs(5))
///     .await;
/// ```
pub struct Supervisor {
    state: SupervisorState,
    runtimes: Vec<ServiceRuntime>,
    failures: FailureChannel,
    failure_sender: FailureSender,
}

impl Supervisor {
    /// Starts every runtime in `specs`, in order.
    ///
    /// The failure channel is sized to the number of runtimes, so no runtime ever blocks
    /// reporting. If any runtime fails to bind, the ones already started are shut down again
    /// before the error is returned: either every listener is bound, or none is.
    pub async fn start(specs: Vec<RuntimeSpec>) -> Result<Self, SupervisorError> {
        let (failures, failure_sender) = FailureChannel::new(specs.len());
        let mut runtimes = Vec::with_capacity(specs.len());

        for spec in specs {
            info!(runtime = %spec.name, addr = %spec.bind_addr, "Ready to start the server...");
            match ServiceRuntime::start(
                spec.name,
                spec.bind_addr,
                spec.router,
                failure_sender.clone(),
            )
            .await
            {
                Ok(runtime) => runtimes.push(runtime),
                Err(e) => {
                    error!(error = %e, started = runtimes.len(), "Startup failed, rolling back");
                    let deadline = Instant::now() + ROLLBACK_BUDGET;
                    for runtime in &mut runtimes {
                        if let Err(rollback) = runtime.shutdown(deadline).await {
                            warn!(error = %rollback, "Rollback drain failed");
                        }
                    }
                    return Err(SupervisorError::Startup(e));
                }
            }
        }

        Ok(Self {
            state: SupervisorState::Running,
            runtimes,
            failures,
            failure_sender,
        })
    }

    /// Blocks until `signal` completes or a runtime reports a failure, whichever is first.
    ///
    /// Only that first trigger is observed. The failure channel is closed before returning,
    /// so later reports are dropped.
    pub async fn wait_for_trigger<F>(&mut self, signal: F) -> ShutdownReason
    where
        F: Future<Output = &'static str>,
    {
        let reason = tokio::select! {
            name = signal => {
                info!(signal = name, "Received");
                ShutdownReason::Signal(name)
            }
            Some(failure) = self.failures.recv() => {
                error!(error = %failure, "Received error from functional unit");
                ShutdownReason::Failure(failure)
            }
        };
        self.failures.close();
        reason
    }

    /// Drains every runtime against one deadline, `budget` from now.
    ///
    /// Runtimes are drained concurrently and independently: one that fails or times out is
    /// reported in the [`DrainReport`] without affecting the others. Draining a supervisor
    /// that already stopped returns an empty report.
    pub async fn drain(&mut self, budget: Duration) -> DrainReport {
        if self.state == SupervisorState::Stopped {
            return DrainReport::default();
        }

        self.state = SupervisorState::Draining;
        self.failures.close();
        info!(?budget, runtimes = self.runtimes.len(), "Stopping the servers...");

        let deadline = Instant::now() + budget;
        let results = join_all(self.runtimes.iter_mut().map(|runtime| async move {
            let name = runtime.name().to_string();
            (name, runtime.shutdown(deadline).await)
        }))
        .await;

        let mut report = DrainReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => report.drained.push(name),
                Err(e) => {
                    error!(runtime = %name, error = %e, "Got an error while stopping the server");
                    report.failures.push(e);
                }
            }
        }

        self.state = SupervisorState::Stopped;
        info!(
            drained = report.drained.len(),
            failed = report.failures.len(),
            "Servers stopped"
        );
        report
    }

    /// Runs `Running → Draining → Stopped` in one call.
    pub async fn run_until<F>(&mut self, signal: F, budget: Duration) -> (ShutdownReason, DrainReport)
    where
        F: Future<Output = &'static str>,
    {
        let reason = self.wait_for_trigger(signal).await;
        let report = self.drain(budget).await;
        (reason, report)
    }

    /// A producer handle on the failure channel, for injecting failures from outside.
    pub fn failure_sender(&self) -> FailureSender {
        self.failure_sender.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn runtime_names(&self) -> Vec<&str> {
        self.runtimes.iter().map(ServiceRuntime::name).collect()
    }

    /// Bound address of the runtime called `name`.
    pub fn local_addr(&self, name: &str) -> Option<SocketAddr> {
        self.runtimes
            .iter()
            .find(|runtime| runtime.name() == name)
            .map(ServiceRuntime::local_addr)
    }
}
