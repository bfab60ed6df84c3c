//! Graceful shutdown and signal handling.
//!
//! Container platforms send SIGTERM before killing an instance; Ctrl+C covers
//! local runs. Either signal stops the listeners accepting and drains
//! in-flight requests for the configured grace period.

use std::time::Duration;

use super::server::ServerHandles;

/// Wait for SIGTERM or SIGINT.
///
/// If a handler cannot be installed that signal is never observed; the other
/// still triggers shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Setup graceful shutdown on SIGTERM and SIGINT.
///
/// When either signal is received, the servers will:
/// 1. Stop accepting new connections
/// 2. Wait up to `grace` for existing connections to complete
/// 3. Shutdown
pub fn setup_shutdown_handler(handles: ServerHandles, grace: Duration) {
    tokio::spawn(async move {
        shutdown_signal().await;

        handles.graceful_shutdown(grace);
        tracing::info!(
            grace_seconds = grace.as_secs(),
            "Graceful shutdown initiated, waiting for connections to close"
        );
    });
}
