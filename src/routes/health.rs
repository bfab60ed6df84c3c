//! Health check endpoint for container orchestration.
//!
//! Provides a liveness probe that returns 200 OK whenever the process is running.
//! Used by Cloud Run, Kubernetes and Docker `HEALTHCHECK` to decide whether the
//! instance should receive traffic or be restarted.

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use http::header::{HeaderValue, CACHE_CONTROL};
use serde::Serialize;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_HEALTH;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Health check handler.
///
/// This is a liveness probe - it only checks that the process can respond to HTTP,
/// so `status` is always "healthy".
pub async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy",
        service: state.service_name().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        project: state.config.deployment.project.clone(),
    })
}

/// Health routes for each configured path, never cached.
pub fn routes(paths: &[String]) -> Router<AppState> {
    paths
        .iter()
        .fold(Router::new(), |router, path| {
            router.route(path, get(health))
        })
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_HEALTH),
        ))
}
