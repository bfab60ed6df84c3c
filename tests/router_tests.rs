//! Router tests driven in-process with `tower::ServiceExt::oneshot`.
//!
//! Run with: cargo test --test router_tests
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use gangway::config::{AppConfig, AppMode};
use gangway::routes::{create_health_router, create_router, with_worker_limits};
use gangway::state::AppState;

fn state_with(configure: impl FnOnce(&mut AppConfig)) -> AppState {
    let mut config = AppConfig::default();
    configure(&mut config);
    AppState::new(config)
}

async fn get_path(app: Router, path: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response body is JSON")
}

// =============================================================================
// Health responder
// =============================================================================

#[tokio::test]
async fn health_paths_return_200_with_body() {
    for path in ["/health", "/_ah/health"] {
        let app = create_router(state_with(|_| {}));
        let (status, headers, body) = get_path(app, path).await;

        assert_eq!(status, StatusCode::OK, "{path}");
        assert!(!body.is_empty());
        assert_eq!(headers.get("cache-control").unwrap(), "no-store");
        assert!(headers.contains_key("x-request-id"));

        let body = json(&body);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "gangway");
        assert!(body["timestamp"].is_string());
        assert!(body.get("project").is_none());
    }
}

#[tokio::test]
async fn health_reports_project_and_service_name() {
    let app = create_router(state_with(|c| {
        c.deployment.project = Some("demo-project".to_string());
        c.app.name = Some("reports".to_string());
    }));
    let (_, _, body) = get_path(app, "/health").await;
    let body = json(&body);
    assert_eq!(body["project"], "demo-project");
    assert_eq!(body["service"], "reports");
}

#[tokio::test]
async fn custom_health_path_replaces_defaults() {
    let state = state_with(|c| c.health.paths = vec!["/healthz".to_string()]);

    let (status, _, _) = get_path(create_router(state.clone()), "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get_path(create_router(state), "/health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_health_is_not_routed() {
    let app = create_router(state_with(|c| c.health.enabled = false));
    let (status, _, _) = get_path(app, "/health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn companion_router_serves_health_only() {
    let state = state_with(|_| {});

    let (status, _, _) = get_path(create_health_router(state.clone()), "/_ah/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get_path(create_health_router(state), "/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Application modes
// =============================================================================

#[tokio::test]
async fn info_mode_describes_service() {
    let app = create_router(state_with(|_| {}));
    let (status, headers, body) = get_path(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache");

    let body = json(&body);
    assert_eq!(body["status"], "running");
    assert!(body["endpoints"]["GET /health"].is_string());
    assert!(body["endpoints"]["GET /_ah/health"].is_string());
}

#[tokio::test]
async fn runtime_reports_worker_pool() {
    let app = create_router(state_with(|c| {
        c.workers.processes = 2;
        c.workers.threads = 4;
        c.workers.timeout_seconds = 300;
    }));
    let (status, _, body) = get_path(app, "/runtime").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["pool"]["capacity"], 8);
    // This request holds a slot while the handler runs
    assert_eq!(body["pool"]["in_flight"], 1);
    assert_eq!(body["workers"]["timeout_seconds"], 300);
    assert_eq!(body["mode"], "info");
    assert_eq!(body["pid"], std::process::id());
    // No process listing, only the server's own pid
    assert!(body.get("process").is_none());
    assert!(body["containerized"].is_boolean());
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn unknown_path_is_json_404() {
    let app = create_router(state_with(|_| {}));
    let (status, _, body) = get_path(app, "/does-not-exist").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = json(&body);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("/does-not-exist"));
}

#[tokio::test]
async fn health_mode_serves_nothing_else() {
    let state = state_with(|c| c.app.mode = AppMode::Health);

    let (status, _, _) = get_path(create_router(state.clone()), "/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get_path(create_router(state), "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn static_mode_serves_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
    std::fs::write(dir.path().join("report.txt"), "quarterly").unwrap();

    let state = state_with(|c| {
        c.app.mode = AppMode::Static;
        c.app.static_dir = dir.path().to_path_buf();
    });

    let (status, _, body) = get_path(create_router(state.clone()), "/report.txt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"quarterly");

    let (status, _, body) = get_path(create_router(state.clone()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<h1>hello</h1>");

    let (status, _, _) = get_path(create_router(state.clone()), "/missing.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Health paths win over the file fallback
    let (status, _, _) = get_path(create_router(state), "/health").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Worker limits
// =============================================================================

#[tokio::test]
async fn request_exceeding_timeout_is_terminated() {
    let state = state_with(|_| {});
    let routes = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        )
        .route("/fast", get(|| async { "done" }));
    let app = with_worker_limits(routes, state.pool.clone(), Some(Duration::from_millis(50)))
        .with_state(state.clone());

    let (status, _, _) = get_path(app.clone(), "/slow").await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    let (status, _, _) = get_path(app, "/fast").await;
    assert_eq!(status, StatusCode::OK);

    // The timed-out request released its slot
    assert_eq!(state.pool.in_flight(), 0);
}

#[tokio::test]
async fn no_timeout_lets_slow_requests_finish() {
    let state = state_with(|_| {});
    let routes = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            "done"
        }),
    );
    let app = with_worker_limits(routes, state.pool.clone(), None).with_state(state);

    let (status, _, body) = get_path(app, "/slow").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"done");
}
