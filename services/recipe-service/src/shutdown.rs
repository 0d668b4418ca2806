//! Graceful Shutdown Module
//!
//! Stops accepting connections on SIGINT/SIGTERM and gives in-flight requests
//! a bounded window to finish. Requests still running when the window closes
//! are dropped, which removes their material files.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Fans a single shutdown trigger out to any number of listeners.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Gets a shutdown receiver
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Signal every subscriber.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for shutdown signal
    pub async fn recv(mut self) {
        // Err means the coordinator is gone, which is shutdown too.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Runs a server until it stops or a shutdown signal arrives.
///
/// On a signal the coordinator is triggered (the server should stop
/// accepting and drain) and the server gets `drain_timeout` to finish.
///
/// # Errors
///
/// Returns the server's own error.
pub async fn run_with_graceful_shutdown<F, E>(
    server: F,
    coordinator: ShutdownCoordinator,
    drain_timeout: Duration,
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    run_until(server, coordinator, drain_timeout, wait_for_signal()).await
}

async fn run_until<F, E, S>(
    server: F,
    coordinator: ShutdownCoordinator,
    drain_timeout: Duration,
    signal: S,
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
    S: Future<Output = ()>,
{
    tokio::pin!(server);

    tokio::select! {
        biased;
        result = &mut server => {
            match &result {
                Ok(()) => info!("Server stopped normally"),
                Err(e) => error!(error = %e, "Server error"),
            }
            return result;
        }
        () = signal => {
            info!("Shutdown signal received, draining in-flight requests");
        }
    }

    coordinator.trigger();

    if let Ok(result) = tokio::time::timeout(drain_timeout, &mut server).await {
        info!("Shutdown complete");
        result
    } else {
        warn!(timeout = ?drain_timeout, "Drain timeout reached, abandoning in-flight requests");
        Ok(())
    }
}
