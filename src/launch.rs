//! Process launch: runtime sizing and the pre-start hook.
//!
//! The Tokio runtime is built explicitly rather than through `#[tokio::main]`
//! because its thread count is a deployment parameter. The pre-start hook runs
//! a one-shot command to completion before any listener is bound, and
//! [`start`] keeps that order.

use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio::runtime::Runtime;

use crate::config::{AppConfig, WorkerConfig};
use crate::http::{Listeners, ServerError};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Pre-start command is empty")]
    EmptyPrestart,

    #[error("Failed to spawn pre-start command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pre-start command '{program}' failed: {status}")]
    Failed { program: String, status: ExitStatus },

    #[error(transparent)]
    Bind(#[from] ServerError),
}

/// Build a multi-threaded runtime sized from the worker pool.
pub fn build_runtime(workers: &WorkerConfig) -> Result<Runtime, LaunchError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers.runtime_threads())
        .thread_name("gangway-worker")
        .enable_all()
        .build()
        .map_err(LaunchError::Runtime)
}

/// Run the pre-start command to completion, inheriting stdio.
pub async fn run_prestart(argv: &[String]) -> Result<(), LaunchError> {
    let (program, args) = argv.split_first().ok_or(LaunchError::EmptyPrestart)?;

    tracing::info!(program = %program, args = ?args, "Running pre-start command");

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(LaunchError::Failed {
            program: program.clone(),
            status,
        });
    }

    tracing::info!(program = %program, "Pre-start command completed");
    Ok(())
}

/// Run the pre-start hook, if any, then bind the listeners.
///
/// A failing hook returns before any socket is bound.
pub async fn start(config: &AppConfig) -> Result<Listeners, LaunchError> {
    if let Some(argv) = &config.launch.prestart {
        run_prestart(argv).await?;
    }

    Ok(Listeners::bind(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_build_runtime_from_pool_size() {
        let workers = WorkerConfig {
            processes: 2,
            threads: 2,
            timeout_seconds: 0,
        };
        let runtime = build_runtime(&workers).unwrap();
        assert_eq!(runtime.metrics().num_workers(), 4);
    }

    #[tokio::test]
    async fn test_prestart_empty_argv() {
        assert!(matches!(
            run_prestart(&[]).await,
            Err(LaunchError::EmptyPrestart)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prestart_success() {
        run_prestart(&argv(&["sh", "-c", "exit 0"])).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prestart_nonzero_exit_is_failure() {
        let result = run_prestart(&argv(&["sh", "-c", "exit 3"])).await;
        match result {
            Err(LaunchError::Failed { program, status }) => {
                assert_eq!(program, "sh");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prestart_missing_program_is_spawn_error() {
        let result = run_prestart(&argv(&["gangway-definitely-not-installed"])).await;
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
    }

    fn local_config(port: u16) -> AppConfig {
        let mut config = AppConfig::default();
        config.http.host = "127.0.0.1".to_string();
        config.http.port = port;
        config
    }

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_prestart_leaves_port_unbound() {
        let port = unused_port();
        let mut config = local_config(port);
        config.launch.prestart = Some(argv(&["sh", "-c", "exit 1"]));

        let result = start(&config).await;
        assert!(matches!(result, Err(LaunchError::Failed { .. })));

        // Nothing holds the port, so it can still be bound
        std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_binds_after_prestart() {
        let port = unused_port();
        let mut config = local_config(port);
        config.launch.prestart = Some(argv(&["sh", "-c", "exit 0"]));

        let listeners = start(&config).await.unwrap();
        assert_eq!(listeners.main_addr().unwrap().port(), port);
        assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_err());
    }

    #[tokio::test]
    async fn test_start_reports_bind_failure() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = local_config(taken.local_addr().unwrap().port());

        let result = start(&config).await;
        assert!(matches!(result, Err(LaunchError::Bind(ServerError::Bind { .. }))));
    }
}
