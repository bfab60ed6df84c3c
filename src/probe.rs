//! Health probe client for container `HEALTHCHECK` directives.
//!
//! One probe run issues up to `retries` GET requests against the local health
//! path, each bounded by `timeout`, and succeeds on the first 200.

use std::time::Duration;

use crate::config::{
    DEFAULT_HEALTH_PATHS, DEFAULT_PORT, PROBE_HOST, PROBE_INTERVAL_SECS, PROBE_RETRIES,
    PROBE_TIMEOUT_SECS, PROBE_USER_AGENT,
};

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Number of attempts before giving up (at least one is always made)
    pub retries: u32,
    /// Delay between attempts
    pub interval: Duration,
    /// Delay before the first attempt
    pub start_period: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            host: PROBE_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_HEALTH_PATHS[0].to_string(),
            timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
            retries: PROBE_RETRIES,
            interval: Duration::from_secs(PROBE_INTERVAL_SECS),
            start_period: Duration::ZERO,
        }
    }
}

impl ProbeOptions {
    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("http://{}:{}{}", self.host, self.port, path)
    }

    fn attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Unhealthy after {attempts} attempt(s): {last}")]
    Unhealthy { attempts: u32, last: String },
}

/// Probe until a 200 is observed or attempts run out.
///
/// Returns the number of attempts it took to observe a healthy response.
pub async fn run_probe(options: &ProbeOptions) -> Result<u32, ProbeError> {
    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .user_agent(PROBE_USER_AGENT)
        .build()?;
    let url = options.url();

    if !options.start_period.is_zero() {
        tokio::time::sleep(options.start_period).await;
    }

    let attempts = options.attempts();
    let mut last = String::new();

    for attempt in 1..=attempts {
        match client.get(&url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::debug!(url = %url, attempt, "Health probe succeeded");
                return Ok(attempt);
            }
            Ok(response) => {
                last = format!("status {}", response.status());
            }
            Err(e) => {
                last = e.to_string();
            }
        }

        tracing::warn!(url = %url, attempt, attempts, reason = %last, "Health probe attempt failed");

        if attempt < attempts {
            tokio::time::sleep(options.interval).await;
        }
    }

    Err(ProbeError::Unhealthy { attempts, last })
}
