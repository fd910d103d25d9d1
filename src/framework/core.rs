//! # Core Runtime Framework
//!
//! This module defines the building blocks every co-located service is made of.
//!
//! ## Key Types
//!
//! - [`ServiceRuntime`]: one bound listener, its router and the task running its accept loop.
//! - [`FailureChannel`]: the single-consumer end of the fan-in queue runtimes report on.
//! - [`FailureSender`]: the cloneable producer end handed to every runtime.

use crate::framework::error::RuntimeError;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

// =============================================================================
// 1. THE FAILURE CHANNEL
// =============================================================================

/// Receiving end of the fan-in failure queue.
///
/// # Architecture Note
/// Every runtime holds a [`FailureSender`] and pushes *at most one* error when its accept
/// loop dies unexpectedly. The supervisor owns the only `FailureChannel` and reads the first
/// value. The queue is bounded, and producers use `try_send`, so a runtime never blocks on a
/// report: as long as the capacity is at least the number of runtimes, every report fits.
#[derive(Debug)]
pub struct FailureChannel {
    receiver: mpsc::Receiver<RuntimeError>,
}

/// Producer handle for the [`FailureChannel`].
#[derive(Clone, Debug)]
pub struct FailureSender {
    sender: mpsc::Sender<RuntimeError>,
}

impl FailureChannel {
    /// Creates the channel and its first producer handle.
    ///
    /// `capacity` should be at least the number of producers; it is clamped to 1.
    pub fn new(capacity: usize) -> (Self, FailureSender) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { receiver }, FailureSender { sender })
    }

    /// Waits for the next reported failure, in arrival order.
    pub async fn recv(&mut self) -> Option<RuntimeError> {
        self.receiver.recv().await
    }

    /// Stops accepting reports. Anything still queued is dropped with the channel.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl FailureSender {
    /// Pushes a failure without waiting. Returns `false` if the report was dropped.
    pub fn report(&self, failure: RuntimeError) -> bool {
        match self.sender.try_send(failure) {
            Ok(()) => true,
            Err(TrySendError::Full(failure)) => {
                warn!(error = %failure, "Failure channel full, dropping report");
                false
            }
            Err(TrySendError::Closed(failure)) => {
                debug!(error = %failure, "Shutdown already in progress, dropping report");
                false
            }
        }
    }
}

// =============================================================================
// 2. THE SERVICE RUNTIME
// =============================================================================

/// One network listener plus its routing and lifecycle control.
///
/// # Lifecycle
///
/// 1.  **Start**: [`ServiceRuntime::start`] binds the listener and spawns the accept loop on
///     its own Tokio task. A bind failure is returned to the caller right away.
/// 2.  **Serve**: requests are routed by the [`Router`]; each connection runs on its own task,
///     owned by the accept loop. If the accept loop dies, the error goes to the
///     [`FailureChannel`].
/// 3.  **Shutdown**: [`ServiceRuntime::shutdown`] stops accepting, lets open connections finish
///     their in-flight requests until the deadline, then aborts the accept loop together with
///     every connection it still owns.
///
/// Dropping a runtime without calling `shutdown` also triggers a graceful stop, because the
/// shutdown trigger fires when its sender is dropped.
#[derive(Debug)]
pub struct ServiceRuntime {
    name: String,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ServiceRuntime {
    /// Binds `bind_addr` and starts serving `router` in the background.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Bind`] if the listener cannot be acquired. Failures after this call
    /// returns are reported on `failures` instead.
    pub async fn start(
        name: impl Into<String>,
        bind_addr: SocketAddr,
        router: Router,
        failures: FailureSender,
    ) -> Result<Self, RuntimeError> {
        let name = name.into();
        let bind_error = |source| RuntimeError::Bind {
            name: name.clone(),
            addr: bind_addr,
            source,
        };

        let listener = TcpListener::bind(bind_addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let runtime = name.clone();

        let task = tokio::spawn(async move {
            info!(%runtime, %local_addr, "Accept loop started");
            match accept_loop(listener, router, shutdown_rx).await {
                Ok(()) => info!(%runtime, "Accept loop stopped"),
                Err(source) => {
                    error!(%runtime, error = %source, "Accept loop failed");
                    failures.report(RuntimeError::Serve {
                        name: runtime,
                        source,
                    });
                }
            }
        });

        Ok(Self {
            name,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Stops the runtime, waiting for in-flight requests until `deadline`.
    ///
    /// Calling this again after the runtime has stopped is a no-op that returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::DrainTimeout`] if requests were still running at the deadline. The
    ///   accept loop and every open connection are aborted, so those requests never complete
    ///   and their clients see the connection drop.
    /// - [`RuntimeError::Crashed`] if the serve task had panicked.
    pub async fn shutdown(&mut self, deadline: Instant) -> Result<(), RuntimeError> {
        let Some(mut task) = self.task.take() else {
            debug!(runtime = %self.name, "Already stopped");
            return Ok(());
        };

        let budget = deadline.saturating_duration_since(Instant::now());
        info!(runtime = %self.name, ?budget, "Draining");

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            // The receiver is gone only if the accept loop already exited.
            let _ = shutdown_tx.send(());
        }

        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => {
                info!(runtime = %self.name, "Drained");
                Ok(())
            }
            Ok(Err(join_error)) => {
                error!(runtime = %self.name, error = %join_error, "Serve task crashed");
                Err(RuntimeError::Crashed {
                    name: self.name.clone(),
                    reason: join_error.to_string(),
                })
            }
            Err(_) => {
                // Dropping the loop drops its JoinSet, which aborts every connection task.
                task.abort();
                let _ = task.await;
                warn!(runtime = %self.name, ?budget, "Drain deadline passed, closing listener");
                Err(RuntimeError::DrainTimeout {
                    name: self.name.clone(),
                    budget,
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The address actually bound (resolves port `0` to the assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `true` until [`ServiceRuntime::shutdown`] has been called.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

/// Accepts connections until `shutdown` fires, then drains them.
///
/// Connection tasks live in a [`JoinSet`] owned by this future, so cancelling the future
/// cancels every request still being served.
async fn accept_loop(
    listener: TcpListener,
    router: Router,
    mut shutdown: oneshot::Receiver<()>,
) -> io::Result<()> {
    let builder = Builder::new(TokioExecutor::new());
    let service = TowerToHyperService::new(router);
    let (drain_tx, drain_rx) = watch::channel(());
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            // Either an explicit request or the handle being dropped.
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) if is_connection_error(&e) => continue,
                    Err(e) => return Err(e),
                };
                debug!(%peer, "Accepted connection");
                connections.spawn(serve_connection(
                    builder.clone(),
                    stream,
                    service.clone(),
                    drain_rx.clone(),
                ));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    let _ = drain_tx.send(());
    debug!(open = connections.len(), "Waiting for open connections");
    while connections.join_next().await.is_some() {}
    Ok(())
}

async fn serve_connection(
    builder: Builder<TokioExecutor>,
    stream: TcpStream,
    service: TowerToHyperService<Router>,
    mut drain: watch::Receiver<()>,
) {
    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = drain.changed() => {
            // Finish the request in flight, then close instead of keeping the connection alive.
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };
    if let Err(e) = result {
        debug!(error = %e, "Connection closed with an error");
    }
}

/// Errors that concern one half-open connection, not the listener itself.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
