//! Operator-driven shutdown triggers.
//!
//! On Unix both `SIGINT` and `SIGTERM` are handled and treated identically; elsewhere only
//! Ctrl-C is. Handlers are installed by [`ShutdownSignal::register`], so a registration
//! failure surfaces at startup rather than when the signal arrives.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Registered termination signals.
#[cfg(unix)]
pub struct ShutdownSignal {
    interrupt: Signal,
    terminate: Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Completes with the name of the first signal received.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

/// Registered termination signals.
#[cfg(not(unix))]
pub struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Completes with the name of the first signal received.
    pub async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "CTRL_C",
            Err(e) => {
                tracing::error!(error = %e, "Ctrl-C handler failed, waiting forever");
                std::future::pending().await
            }
        }
    }
}
