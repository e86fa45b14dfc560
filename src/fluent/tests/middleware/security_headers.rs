//! Tests for the Content-Security-Policy and HSTS headers

use crate::fluent::tests::{
    CLIENT, create_base_config, create_test_router, get_request, json_request, request_from,
};
use crate::{CONTENT_SECURITY_POLICY, HttpMiddleware, RateLimitRule, STRICT_TRANSPORT_SECURITY};
use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use std::time::Duration;
use tower::ServiceExt;

fn assert_security_headers<B>(response: &Response<B>) {
    assert_eq!(
        response.headers()["content-security-policy"],
        CONTENT_SECURITY_POLICY
    );
    assert_eq!(
        response.headers()["strict-transport-security"],
        STRICT_TRANSPORT_SECURITY
    );
}

#[tokio::test]
async fn test_headers_on_success() {
    let app = create_test_router(None).await;
    let response = app.oneshot(get_request("/api/courses")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_headers_on_handler_errors_and_unknown_routes() {
    let app = create_test_router(None).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/profile"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_security_headers(&response);

    let response = app.oneshot(get_request("/api/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_headers_on_pipeline_rejections() {
    let config = create_base_config()
        .with_general_rate_limit(RateLimitRule::new(Duration::from_secs(60), 1));
    let app = create_test_router(Some(config)).await;

    // 403 from the origin policy
    let response = app
        .clone()
        .oneshot(
            request_from(CLIENT)
                .uri("/api/courses")
                .header("origin", "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_security_headers(&response);

    app.clone()
        .oneshot(get_request("/api/courses"))
        .await
        .unwrap();

    // 429 from the general limiter
    let response = app.oneshot(get_request("/api/courses")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_headers_on_payload_rejections() {
    let config = create_base_config().with_max_payload_size_bytes(16);
    let app = create_test_router(Some(config)).await;

    let response = app
        .oneshot(json_request(
            "/api/echo",
            r#"{"essay":"far more than sixteen bytes"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_headers_can_be_excluded() {
    let config =
        create_base_config().with_excluded_middlewares(vec![HttpMiddleware::SecurityHeaders]);
    let app = create_test_router(Some(config)).await;
    let response = app.oneshot(get_request("/api/courses")).await.unwrap();

    assert!(!response.headers().contains_key("content-security-policy"));
    assert!(!response.headers().contains_key("strict-transport-security"));
    assert!(!response.headers().contains_key("x-frame-options"));
}
