//! Runtime introspection at `/runtime`.
//!
//! Reports whether the process runs inside a container, its working directory
//! and uptime, and the live state of the worker pool.

use std::path::Path;

use axum::{extract::State, response::Json, Extension};
use serde_json::{json, Value};

use crate::config::DOCKERENV_PATH;
use crate::error::AppError;
use crate::middleware::RequestId;
use crate::state::AppState;

pub async fn runtime(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<Value>, AppError> {
    let workdir = std::env::current_dir()?;
    let config = &state.config;

    Ok(Json(json!({
        "service": state.service_name(),
        "containerized": Path::new(DOCKERENV_PATH).exists(),
        "pid": std::process::id(),
        "workdir": workdir.display().to_string(),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_seconds": state.uptime().as_secs(),
        "mode": config.app.mode,
        "workers": config.workers,
        "pool": {
            "capacity": state.pool.capacity(),
            "in_flight": state.pool.in_flight(),
            "queued": state.pool.queued(),
        },
        "project": config.deployment.project,
        "request_id": request_id.0.to_string(),
    })))
}
