//! Graceful Shutdown Module
//!
//! Tracks background tasks in a `JoinSet` and fans a shutdown signal out
//! over a watch channel. Tasks observe the signal themselves so they can
//! finish in-flight work before returning.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Shutdown coordinator for graceful termination
pub struct ShutdownCoordinator {
    /// Set to `true` once shutdown starts
    shutdown_tx: watch::Sender<bool>,
    /// Tracked background tasks
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Gets a shutdown receiver
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Spawns a tracked background task.
    ///
    /// The task is expected to watch a [`ShutdownSignal`] and return on its
    /// own; tasks still running after the shutdown timeout are aborted.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            future.await;
            info!(task = name, "Background task finished");
        });
    }

    /// Signals shutdown without waiting.
    pub fn trigger(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Signals shutdown and waits up to `timeout` for tracked tasks.
    pub async fn shutdown(mut self, timeout: Duration) {
        info!("Initiating graceful shutdown");
        self.trigger();

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task failed during shutdown");
                }
            }
        })
        .await;

        match drained {
            Ok(()) => info!("All tasks completed gracefully"),
            Err(_) => {
                warn!(
                    remaining = self.tasks.len(),
                    "Shutdown timeout reached, aborting remaining tasks"
                );
                self.tasks.abort_all();
                while self.tasks.join_next().await.is_some() {}
            }
        }

        info!("Shutdown complete");
    }

    /// Returns the number of active tasks
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
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
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been signalled.
    ///
    /// Also resolves if the coordinator is dropped.
    pub async fn wait(mut self) {
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }

    /// Checks if shutdown has been signaled (non-blocking)
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
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
