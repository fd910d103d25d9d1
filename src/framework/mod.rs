//! Generic runtime framework for co-located network services.
//!
//! This module provides the building blocks the supervisor is assembled from.
//!
//! # Main Components
//!
//! - [`ServiceRuntime`] - One bound listener running its accept loop on its own task
//! - [`FailureChannel`] / [`FailureSender`] - Fan-in queue for unexpected runtime failures
//! - [`RuntimeError`] - Bind, serve, crash and drain errors
//!
//! # Testing
//!
//! See [`mock`] module for a scripted dependency endpoint.

pub mod core;
pub mod error;
pub mod mock;

// Re-export core types for convenience
pub use self::core::*;
pub use self::error::*;
