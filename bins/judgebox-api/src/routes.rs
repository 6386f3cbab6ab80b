use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::AppState;

pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::service_info))
        .route("/run", post(handlers::run_code))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Any origin when none are configured, otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim_end_matches('/').parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use judgebox_core::{Executor, ExecutorConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(root: &std::path::Path) -> Router {
        let executor = Executor::new(ExecutorConfig {
            workspace_root: root.to_path_buf(),
            ..ExecutorConfig::default()
        })
        .unwrap();
        router(Arc::new(AppState { executor }), &[])
    }

    fn has_python() -> bool {
        std::process::Command::new(if cfg!(windows) { "python" } else { "python3" })
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn post_run(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/run")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_code_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = post_run(app(tmp.path()), json!({ "language": "cpp" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "message": "Code is required", "status": "error" }));

        let (status, _) = post_run(app(tmp.path()), json!({ "language": "cpp", "code": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_shape() {
        let tmp = tempfile::tempdir().unwrap();

        let (status, body) = post_run(app(tmp.path()), json!({ "language": "cpp", "code": 5 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/run")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(tmp.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");

        let request = Request::builder()
            .method("POST")
            .uri("/run")
            .body(Body::from(r#"{"code":"print(1)"}"#))
            .unwrap();
        let response = app(tmp.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_language_is_server_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = post_run(
            app(tmp.path()),
            json!({ "language": "ruby", "code": "puts 1" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "success": false, "error": "Unsupported language: ruby" }));
    }

    #[tokio::test]
    async fn test_python_run_success() {
        if !has_python() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = post_run(
            app(tmp.path()),
            json!({ "language": "python", "code": "print(input()[::-1])", "input": "abc" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "output": "cba\n", "language": "python", "input": "abc" })
        );
    }

    #[tokio::test]
    async fn test_python_run_reports_missing_input() {
        if !has_python() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = post_run(
            app(tmp.path()),
            json!({ "language": "py", "code": "print('hi')" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["input"], "No input provided");
        assert_eq!(body["output"], "hi\n");
    }

    #[tokio::test]
    async fn test_service_info() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = get_text(app(tmp.path()), "/").await;
        assert_eq!(status, StatusCode::OK);

        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(
            body["supportedLanguages"],
            json!(["cpp", "c++", "java", "python", "python3", "py"])
        );
    }

    #[tokio::test]
    async fn test_health_check() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = get_text(app(tmp.path()), "/status").await;
        assert_eq!(status, StatusCode::OK);

        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert!(body["available_slots"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_metrics_after_run() {
        let tmp = tempfile::tempdir().unwrap();
        post_run(app(tmp.path()), json!({ "language": "cobol", "code": "DISPLAY 1" })).await;

        let (status, body) = get_text(app(tmp.path()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"language="unsupported""#));
        assert!(body.contains(r#"outcome="unsupported_language""#));
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let tmp = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/run")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app(tmp.path()).oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            HeaderValue::from_static("*")
        );
    }

    #[test]
    fn test_cors_layer_skips_bad_origins() {
        // building must not panic on a malformed entry
        let _ = cors_layer(&["http://localhost:5173/".to_string(), "bad\norigin".to_string()]);
    }
}
