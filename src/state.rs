//! Shared application state for request handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::pool::WorkerPool;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Contains the resolved configuration, the worker pool gate and the process
/// start time used for uptime reporting.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: WorkerPool,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl AppState {
    /// Creates a new application state, sizing the pool from the worker config.
    pub fn new(config: AppConfig) -> Self {
        let pool = WorkerPool::new(config.workers.pool_size());
        Self {
            config: Arc::new(config),
            pool,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn service_name(&self) -> &str {
        self.config.app.service_name()
    }
}
