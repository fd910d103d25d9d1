//! # Observability Recipe
//!
//! > **A Recipe for co-located, observable HTTP runtimes in Rust.**
//!
//! This crate runs several independent HTTP runtimes inside one process under a single
//! supervisor. A business-logic runtime serves a chained call (`/rent` calls `/check`), and a
//! diagnostics runtime exposes `/health` and a Prometheus `/metrics` endpoint. The trace context
//! of every inbound call flows, explicitly, into the outbound call it causes.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Why one process, several runtimes?
//!
//! Business traffic and diagnostics traffic have different consumers. Serving them on separate
//! listeners keeps scrapes and health checks out of the business port, while one supervisor
//! still gives the process a single lifecycle:
//! - **All or nothing startup**: Either every listener is bound, or none is.
//! - **First trigger wins**: A signal or the first runtime failure starts the shutdown.
//! - **Bounded drain**: Every runtime is stopped against one shared deadline.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! Each layer defines its own error type (`RuntimeError`, `DependentCallError`, `ConfigError`,
//! `SupervisorError`) with `thiserror`. Only `main` erases them into `anyhow::Error`.
//!
//! ### 2. Explicit Trace Context
//! There is no ambient "current trace". Each request gets an OpenTelemetry server span from the
//! [`RequestTracer`](telemetry::RequestTracer) in the router state. Handlers receive it as a
//! [`TraceContext`](telemetry::TraceContext) extractor and pass it by reference to the client
//! that makes the outbound call, which injects the W3C `traceparent` header.
//!
//! ### 3. Concurrency Model
//! Every runtime runs in its own Tokio task. Runtimes never call each other directly; they
//! report failures to the supervisor over a bounded channel.
//!
//! ### 4. Observability
//! We use `tracing` everywhere with structured logging. Request spans carry `trace_id` and
//! `span_id`, so one chain can be followed across both hops.
//! See the [`lifecycle::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! - **Role**: One listener with a graceful, deadline-bounded shutdown, and the failure channel.
//! - **Key items**: [`ServiceRuntime`](framework::ServiceRuntime),
//!   [`FailureChannel`](framework::FailureChannel), [`MockEndpoint`](framework::mock::MockEndpoint).
//!
//! ### 2. The Orchestrator ([`lifecycle`])
//! - **Role**: Wires the runtimes and owns their lifecycle.
//! - **Key items**: [`Supervisor`](lifecycle::Supervisor), [`runtime_specs`](lifecycle::runtime_specs).
//!
//! ### 3. The Interface ([`clients`])
//! - **Role**: The outbound `/check` call, with trace propagation and an explicit timeout.
//! - **Key items**: [`VerifyClient`](clients::VerifyClient).
//!
//! ### 4. The Implementation ([`rental`], [`diagnostics`])
//! - **Role**: The handlers of each runtime.
//!
//! ### 5. Cross-cutting ([`telemetry`], [`config`])
//! - **Role**: Trace context, the request counter, and environment configuration.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! PORT=8080 DIAG_PORT=8081 cargo run
//! curl -i localhost:8080/rent
//! curl localhost:8081/metrics
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod clients;
pub mod config;
pub mod diagnostics;
pub mod framework;
pub mod lifecycle;
pub mod rental;
pub mod telemetry;
