//! gangway: container process launcher.
//!
//! This is the application entry point. It parses the command line, resolves
//! configuration from file, environment and flags, initializes tracing, sizes
//! the runtime from the worker pool, runs the pre-start hook, binds the
//! listeners and serves until SIGTERM. The `probe` subcommand is the matching
//! container health check.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gangway::config::{
    parse_port, AppConfig, AppMode, LoggingConfig, Overrides, DEFAULT_HEALTH_PATHS,
    DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_PROBE_LOG_FILTER, ENV_PORT, PROBE_INTERVAL_SECS,
    PROBE_RETRIES, PROBE_TIMEOUT_SECS,
};
use gangway::http::{serve, shutdown, ServerHandles};
use gangway::launch;
use gangway::probe::{run_probe, ProbeOptions};
use gangway::state::AppState;

/// gangway: bounded worker-pool HTTP launcher with a liveness endpoint
#[derive(Parser, Debug)]
#[command(name = "gangway", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Log level filter (e.g., "gangway=debug,tower_http=info")
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Serve flags, accepted without the `serve` subcommand
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve HTTP (the default when no subcommand is given)
    Serve(ServeArgs),
    /// Check the local health endpoint; exit 0 when healthy
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host
    #[arg(long)]
    bind: Option<String>,

    /// Listen port (overrides $PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Worker processes
    #[arg(short, long)]
    workers: Option<usize>,

    /// Threads per worker process
    #[arg(short, long)]
    threads: Option<usize>,

    /// Per-request timeout in seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// Application surface to serve
    #[arg(long, value_enum)]
    mode: Option<AppMode>,

    /// Directory to serve in static mode (implies --mode static)
    #[arg(long = "static")]
    static_dir: Option<PathBuf>,

    /// Companion port serving only the health paths
    #[arg(long)]
    health_port: Option<u16>,

    /// Command run to completion before serving
    #[arg(last = true)]
    prestart: Vec<String>,
}

impl ServeArgs {
    fn overrides(&self) -> Overrides {
        let mode = match (self.mode, &self.static_dir) {
            (None, Some(_)) => Some(AppMode::Static),
            (mode, _) => mode,
        };

        Overrides {
            host: self.bind.clone(),
            port: self.port,
            processes: self.workers,
            threads: self.threads,
            timeout_seconds: self.timeout,
            mode,
            static_dir: self.static_dir.clone(),
            health_port: self.health_port,
            prestart: (!self.prestart.is_empty()).then(|| self.prestart.clone()),
        }
    }
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Port to probe (defaults to $PORT, then 8080)
    #[arg(short, long)]
    port: Option<u16>,

    /// Health path to request
    #[arg(long, default_value = DEFAULT_HEALTH_PATHS[0])]
    path: String,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = PROBE_TIMEOUT_SECS)]
    timeout: u64,

    /// Attempts before reporting unhealthy
    #[arg(long, default_value_t = PROBE_RETRIES)]
    retries: u32,

    /// Seconds between attempts
    #[arg(long, default_value_t = PROBE_INTERVAL_SECS)]
    interval: u64,

    /// Seconds to wait before the first attempt
    #[arg(long, default_value_t = 0)]
    start_period: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Probe(args)) => probe(args, cli.log_level),
        Some(Command::Serve(args)) => serve_command(args, cli.log_level),
        None => serve_command(cli.serve, cli.log_level),
    }
}

/// Initialize tracing with priority: CLI > env > default
fn init_tracing(log_level: Option<String>, default_filter: &str, logging: &LoggingConfig) {
    let log_filter = log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| default_filter.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));

    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn serve_command(args: ServeArgs, log_level: Option<String>) -> ExitCode {
    // Tracing needs the configured format, so configuration errors go to stderr
    let (config, env_report) = match AppConfig::resolve(
        args.config.as_deref(),
        |key| std::env::var(key).ok(),
        &args.overrides(),
    ) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("gangway: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(log_level, DEFAULT_LOG_FILTER, &config.logging);

    if let Some(raw) = env_report.rejected_port {
        tracing::warn!(
            value = %raw,
            port = config.http.port,
            "Ignoring invalid PORT, using configured port"
        );
    }

    tracing::info!(
        host = %config.http.host,
        port = config.http.port,
        processes = config.workers.processes,
        threads = config.workers.threads,
        timeout_seconds = config.workers.timeout_seconds,
        mode = %config.app.mode,
        project = ?config.deployment.project,
        "Loaded configuration"
    );

    let runtime = match launch::build_runtime(&config.workers) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => {
            tracing::info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let listeners = launch::start(&config).await?;
    let grace = config.http.shutdown_grace();
    let state = AppState::new(config);

    let handles = ServerHandles::new();
    shutdown::setup_shutdown_handler(handles.clone(), grace);

    serve(state, listeners, handles).await?;
    Ok(())
}

fn probe(args: ProbeArgs, log_level: Option<String>) -> ExitCode {
    init_tracing(log_level, DEFAULT_PROBE_LOG_FILTER, &LoggingConfig::default());

    let port = args.port.unwrap_or_else(|| {
        std::env::var(ENV_PORT)
            .ok()
            .and_then(|raw| parse_port(&raw))
            .unwrap_or(DEFAULT_PORT)
    });

    let options = ProbeOptions {
        port,
        path: args.path,
        timeout: Duration::from_secs(args.timeout),
        retries: args.retries,
        interval: Duration::from_secs(args.interval),
        start_period: Duration::from_secs(args.start_period),
        ..Default::default()
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("gangway: failed to build runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_probe(&options)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, url = %options.url(), "Health probe failed");
            ExitCode::FAILURE
        }
    }
}
