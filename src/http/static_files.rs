//! Static file serving for the static application mode.
//!
//! Serves a directory the way a bare file server would: files by path, and
//! `index.html` for directory requests.

use std::path::Path;

use tower_http::services::ServeDir;

/// Create a static file service rooted at `dir`.
pub fn create_static_service(dir: &Path) -> ServeDir {
    ServeDir::new(dir).append_index_html_on_directories(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn status_of(dir: &Path, path: &str) -> StatusCode {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = create_static_service(dir).oneshot(request).await.unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_missing_root_answers_not_found() {
        let status = status_of(Path::new("/nonexistent/site"), "/index.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_directory_request_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("index.html"), "<p>docs</p>").unwrap();

        assert_eq!(status_of(dir.path(), "/docs/").await, StatusCode::OK);
        assert_eq!(status_of(dir.path(), "/docs/missing.html").await, StatusCode::NOT_FOUND);
    }
}
