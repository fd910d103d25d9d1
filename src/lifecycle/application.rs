use crate::clients::VerifyClient;
use crate::config::Config;
use crate::diagnostics;
use crate::lifecycle::{RuntimeSpec, SupervisorError};
use crate::rental::{self, RentalState};
use crate::telemetry::{Metrics, RequestTracer};

/// Name reported by `/health`.
pub const SERVICE_NAME: &str = "simple-observability";

/// Runtime serving `/rent` and `/check`.
pub const BUSINESS_RUNTIME: &str = "bl";

/// Runtime serving `/health` and `/metrics`.
pub const DIAGNOSTICS_RUNTIME: &str = "diag";

/// Optional runtime serving a standalone `/check`.
pub const VERIFY_RUNTIME: &str = "verify";

/// Wires the application's runtimes from `config`, in start order.
///
/// The standalone verification runtime, when configured, comes first so it is already
/// listening once `/rent` can be called. Every runtime shares `metrics`, and every traced
/// route opens its server spans through `tracer`.
///
/// # Wiring
///
/// ```text
/// [verify]  /check
/// bl        /rent ──GET /check──▶ verify, or bl itself
///           /check
/// diag      /health
///           /metrics ◀── rent_requests_total
/// ```
pub fn runtime_specs(
    config: &Config,
    metrics: &Metrics,
    tracer: &RequestTracer,
) -> Result<Vec<RuntimeSpec>, SupervisorError> {
    let mut specs = Vec::with_capacity(3);

    if let Some(addr) = config.verify_addr() {
        specs.push(RuntimeSpec::new(VERIFY_RUNTIME, addr, rental::verify_router(tracer.clone())));
    }

    let verify = VerifyClient::new(config.verify_base_url(), config.dependency_timeout())?;
    let state = RentalState::new(verify, metrics.rent_requests().clone(), tracer.clone());
    specs.push(RuntimeSpec::new(
        BUSINESS_RUNTIME,
        config.business_addr(),
        rental::router(state),
    ));

    specs.push(RuntimeSpec::new(
        DIAGNOSTICS_RUNTIME,
        config.diagnostics_addr(),
        diagnostics::router(SERVICE_NAME, metrics.clone()),
    ));

    Ok(specs)
}
