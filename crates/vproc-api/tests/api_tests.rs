//! API integration tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use vproc_api::{create_router, ApiConfig, AppState};

async fn create_test_router() -> axum::Router {
    dotenvy::dotenv().ok();
    let state = AppState::new(ApiConfig::default()).expect("failed to build app state");
    create_router(state, None)
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

/// Unknown routes return 404.
#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Submit validation rejects an out-of-range priority before anything is
/// persisted or published.
#[tokio::test]
async fn test_submit_rejects_invalid_priority() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/videos")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"sourcePath": "uploads/clip.mp4", "priority": 11}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Submit validation rejects an empty source path.
#[tokio::test]
async fn test_submit_rejects_empty_source_path() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/videos")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"sourcePath": ""}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Unknown ids report NOT_FOUND as a body state, not an HTTP error.
/// Requires a running Redis at REDIS_URL.
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_status_for_unknown_id_is_not_found_state() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/videos/999999/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "NOT_FOUND");
    assert!(body.get("videoId").is_none());
}

/// Cancelling an unknown id also reports NOT_FOUND.
/// Requires a running Redis at REDIS_URL.
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_cancel_unknown_id() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/videos/999999/cancel")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "NOT_FOUND");
}
