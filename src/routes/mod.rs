//! HTTP route assembly.
//!
//! The main listener serves the configured application surface behind the
//! worker pool gate and the request timeout, with the health paths mounted
//! beside it so liveness never queues behind application work. The companion
//! listener, when configured, serves the health paths alone.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod health;
pub mod index;
pub mod runtime;

use std::time::Duration;

use axum::{
    http::{StatusCode, Uri},
    middleware,
    routing::get,
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::{AppMode, CACHE_CONTROL_INFO};
use crate::error::AppError;
use crate::http::static_files::create_static_service;
use crate::middleware::request_id_layer;
use crate::pool::{worker_pool_layer, WorkerPool};
use crate::state::AppState;

/// Wrap application routes with the worker pool gate and optional timeout.
///
/// The timeout runs inside the gate, so time spent queueing for a slot does
/// not count against the request.
pub fn with_worker_limits(
    routes: Router<AppState>,
    pool: WorkerPool,
    timeout: Option<Duration>,
) -> Router<AppState> {
    let routes = match timeout {
        Some(timeout) => routes.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        )),
        None => routes,
    };

    routes.layer(middleware::from_fn_with_state(pool, worker_pool_layer))
}

/// Fallback for paths no route claims.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Creates the main Axum router for the configured application mode.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let app_routes = match config.app.mode {
        // Service description - revalidate, it reflects live runtime values
        AppMode::Info => Router::new()
            .route("/", get(index::index))
            .route("/runtime", get(runtime::runtime))
            .layer(SetResponseHeaderLayer::if_not_present(
                CACHE_CONTROL,
                HeaderValue::from_static(CACHE_CONTROL_INFO),
            )),
        AppMode::Static => {
            Router::new().fallback_service(create_static_service(&config.app.static_dir))
        }
        AppMode::Health => Router::new(),
    };

    let app_routes = with_worker_limits(
        app_routes,
        state.pool.clone(),
        config.workers.request_timeout(),
    );

    let mut router = Router::new().merge(app_routes);

    if config.health.enabled {
        router = router.merge(health::routes(&config.health.paths));
    }

    // Static mode already owns the fallback
    if config.app.mode != AppMode::Static {
        router = router.fallback(not_found);
    }

    router
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

/// Creates the companion router: health paths only.
pub fn create_health_router(state: AppState) -> Router {
    let paths = state.config.health.paths.clone();

    health::routes(&paths)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(request_id_layer))
}
