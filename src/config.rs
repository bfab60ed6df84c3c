//! Configuration loading and constants.
//!
//! Builds the launch configuration in layers: built-in defaults, an optional
//! TOML file, the container environment (`PORT`, `GOOGLE_CLOUD_PROJECT`,
//! `FLASK_APP`) and finally command-line overrides. `AppConfig` is the root
//! configuration struct; it is resolved once at startup and never mutated.

use const_format::formatcp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Listener Defaults
// =============================================================================

/// Default bind host (all interfaces, as containers expect)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port when `PORT` is absent or invalid
pub const DEFAULT_PORT: u16 = 8080;

/// Default drain window for in-flight requests on SIGTERM
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

// =============================================================================
// Worker Pool Constants
// =============================================================================

/// Default number of worker processes
pub const DEFAULT_PROCESSES: usize = 1;

/// Default number of threads per worker process
pub const DEFAULT_THREADS: usize = 8;

/// Upper bound on worker processes
pub const MAX_PROCESSES: usize = 64;

/// Upper bound on threads per worker process
pub const MAX_THREADS: usize = 1024;

/// Upper bound on runtime worker threads; larger pools share them
pub const MAX_RUNTIME_THREADS: usize = 64;

// =============================================================================
// Health Responder Constants
// =============================================================================

/// Liveness paths polled by container platforms
pub const DEFAULT_HEALTH_PATHS: [&str; 2] = ["/health", "/_ah/health"];

/// Paths owned by the info application surface
pub const INFO_PATHS: [&str; 2] = ["/", "/runtime"];

/// Health responses must never be served from a cache
pub const CACHE_CONTROL_HEALTH: &str = "no-store";

/// Service descriptions may be revalidated but not reused blindly
pub const CACHE_CONTROL_INFO: &str = "no-cache";

// =============================================================================
// Health Probe Constants
// =============================================================================

/// Host the probe targets (the probe runs inside the container)
pub const PROBE_HOST: &str = "127.0.0.1";

/// Per-attempt probe timeout in seconds
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Number of probe attempts before reporting unhealthy
pub const PROBE_RETRIES: u32 = 3;

/// Delay between probe attempts in seconds
pub const PROBE_INTERVAL_SECS: u64 = 1;

// =============================================================================
// Environment, Paths and Strings
// =============================================================================

/// Listen port variable set by Cloud Run and most container platforms
pub const ENV_PORT: &str = "PORT";

/// Deployment project identifier
pub const ENV_GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";

/// Application entry-point name, used as the service name
pub const ENV_FLASK_APP: &str = "FLASK_APP";

/// Marker file present inside Docker containers
pub const DOCKERENV_PATH: &str = "/.dockerenv";

/// Response header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default service name when neither config nor `FLASK_APP` provide one
pub const DEFAULT_SERVICE_NAME: &str = "gangway";

/// User agent sent by the health probe
pub const PROBE_USER_AGENT: &str =
    formatcp!("{}-probe/{}", DEFAULT_SERVICE_NAME, env!("CARGO_PKG_VERSION"));

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "gangway=info,tower_http=info";

/// Default log filter for the probe subcommand (quiet unless it fails)
pub const DEFAULT_PROBE_LOG_FILTER: &str = "gangway=warn";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP listener configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Worker pool sizing and request timeout
    #[serde(default)]
    pub workers: WorkerConfig,
    /// Liveness endpoint configuration
    #[serde(default)]
    pub health: HealthConfig,
    /// Built-in application surface
    #[serde(default)]
    pub app: AppSurfaceConfig,
    #[serde(default)]
    pub launch: LaunchConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
    /// Whether HTTP/1.1 connections are kept open between requests
    #[serde(default = "HttpServerConfig::default_keep_alive")]
    pub keep_alive: bool,
    /// Seconds to drain in-flight requests after SIGTERM
    #[serde(default = "HttpServerConfig::default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            keep_alive: Self::default_keep_alive(),
            shutdown_grace_seconds: Self::default_shutdown_grace(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_PORT
    }

    fn default_keep_alive() -> bool {
        true
    }

    fn default_shutdown_grace() -> u64 {
        DEFAULT_SHUTDOWN_GRACE_SECS
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Worker pool configuration: processes × threads bounds in-flight requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "WorkerConfig::default_processes")]
    pub processes: usize,
    #[serde(default = "WorkerConfig::default_threads")]
    pub threads: usize,
    /// Per-request ceiling in seconds; 0 disables the timeout
    #[serde(default)]
    pub timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            processes: Self::default_processes(),
            threads: Self::default_threads(),
            timeout_seconds: 0,
        }
    }
}

impl WorkerConfig {
    fn default_processes() -> usize {
        DEFAULT_PROCESSES
    }

    fn default_threads() -> usize {
        DEFAULT_THREADS
    }

    /// Maximum number of requests in flight at once
    pub fn pool_size(&self) -> usize {
        self.processes * self.threads
    }

    /// Runtime worker threads: one per pool slot, capped
    pub fn runtime_threads(&self) -> usize {
        self.pool_size().clamp(1, MAX_RUNTIME_THREADS)
    }

    /// Per-request timeout, or `None` when requests may run indefinitely
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Liveness endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "HealthConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "HealthConfig::default_paths")]
    pub paths: Vec<String>,
    /// Companion port serving only the health paths
    pub port: Option<u16>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            paths: Self::default_paths(),
            port: None,
        }
    }
}

impl HealthConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_paths() -> Vec<String> {
        DEFAULT_HEALTH_PATHS.iter().map(|p| p.to_string()).collect()
    }
}

/// Which built-in application the main listener serves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// Service description and runtime introspection
    #[default]
    Info,
    /// Files from a directory
    Static,
    /// Health paths only
    Health,
}

impl std::fmt::Display for AppMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppMode::Info => write!(f, "info"),
            AppMode::Static => write!(f, "static"),
            AppMode::Health => write!(f, "health"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSurfaceConfig {
    #[serde(default)]
    pub mode: AppMode,
    /// Service name. Falls back to `FLASK_APP`, then the default name.
    pub name: Option<String>,
    /// Directory served in static mode
    #[serde(default = "AppSurfaceConfig::default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for AppSurfaceConfig {
    fn default() -> Self {
        Self {
            mode: AppMode::default(),
            name: None,
            static_dir: Self::default_static_dir(),
        }
    }
}

impl AppSurfaceConfig {
    fn default_static_dir() -> PathBuf {
        PathBuf::from(".")
    }

    /// Effective service name
    pub fn service_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_SERVICE_NAME)
    }
}

/// One-shot command run to completion before the listener is bound
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaunchConfig {
    pub prestart: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentConfig {
    /// Opaque deployment project identifier
    pub project: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

/// Command-line overrides, highest precedence
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub processes: Option<usize>,
    pub threads: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub mode: Option<AppMode>,
    pub static_dir: Option<PathBuf>,
    pub health_port: Option<u16>,
    pub prestart: Option<Vec<String>>,
}

/// What the environment overlay rejected, reported once logging is up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvReport {
    /// `PORT` value that was present but not a usable port
    pub rejected_port: Option<String>,
}

/// Parse a `PORT` value. Ports must be in 1..=65535.
pub fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|port| *port != 0)
}

impl AppConfig {
    /// Load from a TOML file, or start from defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                Ok(toml::from_str(&contents)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Resolve the full configuration: file, then environment, then overrides.
    pub fn resolve<F>(
        path: Option<&Path>,
        lookup: F,
        overrides: &Overrides,
    ) -> Result<(Self, EnvReport), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load(path)?;
        let report = config.apply_env(lookup);
        config.apply_overrides(overrides);
        config.validate()?;
        Ok((config, report))
    }

    /// Overlay container environment variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> EnvReport
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut report = EnvReport::default();

        if let Some(raw) = lookup(ENV_PORT) {
            match parse_port(&raw) {
                Some(port) => self.http.port = port,
                None => report.rejected_port = Some(raw),
            }
        }

        if let Some(project) = lookup(ENV_GOOGLE_CLOUD_PROJECT).filter(|p| !p.trim().is_empty()) {
            self.deployment.project = Some(project);
        }

        if self.app.name.is_none() {
            self.app.name = lookup(ENV_FLASK_APP).filter(|n| !n.trim().is_empty());
        }

        report
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.http.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.http.port = port;
        }
        if let Some(processes) = overrides.processes {
            self.workers.processes = processes;
        }
        if let Some(threads) = overrides.threads {
            self.workers.threads = threads;
        }
        if let Some(timeout) = overrides.timeout_seconds {
            self.workers.timeout_seconds = timeout;
        }
        if let Some(mode) = overrides.mode {
            self.app.mode = mode;
        }
        if let Some(dir) = &overrides.static_dir {
            self.app.static_dir = dir.clone();
        }
        if let Some(port) = overrides.health_port {
            self.health.port = Some(port);
        }
        if let Some(prestart) = &overrides.prestart {
            self.launch.prestart = Some(prestart.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be between 1 and 65535".to_string(),
            ));
        }

        if !(1..=MAX_PROCESSES).contains(&self.workers.processes) {
            return Err(ConfigError::Validation(format!(
                "workers.processes must be between 1 and {}, got {}",
                MAX_PROCESSES, self.workers.processes
            )));
        }

        if !(1..=MAX_THREADS).contains(&self.workers.threads) {
            return Err(ConfigError::Validation(format!(
                "workers.threads must be between 1 and {}, got {}",
                MAX_THREADS, self.workers.threads
            )));
        }

        if self.health.enabled || self.health.port.is_some() {
            if self.health.paths.is_empty() {
                return Err(ConfigError::Validation(
                    "health.paths must not be empty".to_string(),
                ));
            }
            if let Some(path) = self.health.paths.iter().find(|p| !p.starts_with('/')) {
                return Err(ConfigError::Validation(format!(
                    "health path '{}' must start with '/'",
                    path
                )));
            }
            for (i, path) in self.health.paths.iter().enumerate() {
                if self.health.paths[..i].contains(path) {
                    return Err(ConfigError::Validation(format!(
                        "health path '{}' is listed twice",
                        path
                    )));
                }
                if self.health.enabled
                    && self.app.mode == AppMode::Info
                    && INFO_PATHS.contains(&path.as_str())
                {
                    return Err(ConfigError::Validation(format!(
                        "health path '{}' collides with the info application",
                        path
                    )));
                }
            }
        }

        match self.health.port {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "health.port must be between 1 and 65535".to_string(),
                ))
            }
            Some(port) if port == self.http.port => {
                return Err(ConfigError::Validation(format!(
                    "health.port {} collides with http.port",
                    port
                )))
            }
            _ => {}
        }

        if self.app.mode == AppMode::Health && !self.health.enabled {
            return Err(ConfigError::Validation(
                "app.mode = \"health\" requires health.enabled".to_string(),
            ));
        }

        if self.app.mode == AppMode::Static && !self.app.static_dir.is_dir() {
            return Err(ConfigError::Validation(format!(
                "app.static_dir '{}' is not a directory",
                self.app.static_dir.display()
            )));
        }

        if matches!(&self.launch.prestart, Some(argv) if argv.is_empty()) {
            return Err(ConfigError::Validation(
                "launch.prestart must name a program".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
