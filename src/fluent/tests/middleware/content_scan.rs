//! Tests for suspicious-content warnings

use crate::HttpMiddleware;
use crate::fluent::tests::{
    create_base_config, create_test_router, get_body_json, get_request, json_request,
};
use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_script_in_body_is_logged_but_not_blocked() {
    let app = create_test_router(None).await;
    let response = app
        .oneshot(json_request(
            "/api/echo",
            r#"{"profile":{"bio":"<script>alert('x')</script>"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        get_body_json(response).await,
        json!({"profile": {"bio": "<script>alert('x')</script>"}})
    );
    assert!(logs_contain("Suspicious content detected"));
    assert!(logs_contain("body.profile.bio"));
    assert!(logs_contain("script-tag"));
}

#[tokio::test]
#[traced_test]
async fn test_inline_handler_in_query_is_logged() {
    let app = create_test_router(None).await;
    // comment=<img src=x onerror=alert(1)>
    let response = app
        .oneshot(get_request(
            "/api/query?comment=%3Cimg%20src%3Dx%20onerror%3Dalert(1)%3E",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(logs_contain("Suspicious content detected"));
    assert!(logs_contain("query.comment"));
}

#[tokio::test]
#[traced_test]
async fn test_javascript_uri_in_array_is_logged() {
    let app = create_test_router(None).await;
    let response = app
        .oneshot(json_request(
            "/api/echo",
            r#"{"links":["https://hub.example.edu","JavaScript:void(0)"]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(logs_contain("body.links.1"));
}

#[tokio::test]
#[traced_test]
async fn test_benign_content_is_silent() {
    let app = create_test_router(None).await;
    let response = app
        .oneshot(json_request(
            "/api/echo",
            r#"{"title":"Office hours moved to Tuesday","room":"B-204"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!logs_contain("Suspicious content detected"));
}

#[tokio::test]
#[traced_test]
async fn test_scanner_can_be_excluded() {
    let config =
        create_base_config().with_excluded_middlewares(vec![HttpMiddleware::ContentScan]);
    let app = create_test_router(Some(config)).await;
    let response = app
        .oneshot(json_request("/api/echo", r#"{"bio":"<iframe src=x>"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!logs_contain("Suspicious content detected"));
}
