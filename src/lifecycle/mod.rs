//! Process lifecycle and runtime orchestration.
//!
//! This module contains everything between `main` and the individual runtimes:
//!
//! - **Wiring**: Building the business, diagnostics and optional verification runtimes
//! - **Supervision**: Atomic startup, watching for the first trigger, bounded drain
//! - **Signals**: Turning `SIGINT` / `SIGTERM` into a shutdown trigger
//! - **Observability setup**: Initializing tracing and logging
//!
//! # Main Components
//!
//! - [`Supervisor`] - Owns every runtime and the failure channel they report to
//! - [`runtime_specs`] - Describes the runtimes of this application
//! - [`ShutdownSignal`] - Registered termination signals
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure

pub mod application;
pub mod signals;
pub mod supervisor;
pub mod tracing;

pub use self::application::*;
pub use self::signals::*;
pub use self::supervisor::*;
pub use self::tracing::*;
