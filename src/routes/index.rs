//! Service description at `/`.

use axum::{extract::State, response::Json};
use serde_json::{json, Map, Value};

use crate::state::AppState;

/// Describe the service and the endpoints it answers.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    let mut endpoints = Map::new();
    endpoints.insert("GET /".to_string(), json!("Service description"));
    endpoints.insert("GET /runtime".to_string(), json!("Runtime and worker pool status"));
    if state.config.health.enabled {
        for path in &state.config.health.paths {
            endpoints.insert(format!("GET {}", path), json!("Health check"));
        }
    }

    Json(json!({
        "service": state.service_name(),
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}
