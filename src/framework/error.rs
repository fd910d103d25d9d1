//! # Runtime Errors
//!
//! Errors raised by a [`ServiceRuntime`](crate::framework::ServiceRuntime) over its lifetime.
//! Bind failures come back synchronously from `start`; serve failures travel through the
//! [`FailureChannel`](crate::framework::FailureChannel); drain failures come back from
//! `shutdown`.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The listener could not be acquired.
    #[error("{name}: failed to bind {addr}: {source}")]
    Bind {
        name: String,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop stopped for a reason other than a requested shutdown.
    #[error("{name}: accept loop failed: {source}")]
    Serve {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The serve task panicked or was cancelled from outside.
    #[error("{name}: serve task crashed: {reason}")]
    Crashed { name: String, reason: String },

    /// In-flight requests were still running when the drain deadline passed.
    #[error("{name}: did not drain within {budget:?}, listener closed forcibly")]
    DrainTimeout { name: String, budget: Duration },
}

impl RuntimeError {
    /// Name of the runtime the error belongs to.
    pub fn runtime(&self) -> &str {
        match self {
            RuntimeError::Bind { name, .. }
            | RuntimeError::Serve { name, .. }
            | RuntimeError::Crashed { name, .. }
            | RuntimeError::DrainTimeout { name, .. } => name,
        }
    }
}
