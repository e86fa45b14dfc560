//! Tests for filters and layers working together

use crate::fluent::tests::{
    ALLOWED_ORIGIN, CLIENT, CLIENT_IP, create_base_config, create_test_fluent, create_test_router,
    get_body_json, request_from,
};
use crate::{CONTENT_SECURITY_POLICY, RateLimitRule};
use axum::{body::Body, http::StatusCode};
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;

#[tokio::test]
async fn test_guard_rejection_carries_headers_and_request_id() {
    let config = create_base_config()
        .with_auth_rate_limit(RateLimitRule::new(Duration::from_secs(900), 1));
    let app = create_test_router(Some(config)).await;

    let login = || {
        request_from(CLIENT)
            .method("POST")
            .uri("/api/auth/login")
            .header("x-request-id", "login-attempt")
            .body(Body::empty())
            .unwrap()
    };

    app.clone().oneshot(login()).await.unwrap();
    let response = app.oneshot(login()).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-request-id"], "login-attempt");
    assert_eq!(
        response.headers()["content-security-policy"],
        CONTENT_SECURITY_POLICY
    );
    assert_eq!(response.headers()["retry-after"], "900");
}

#[tokio::test]
async fn test_rejections_echo_allowed_origin() {
    let config = create_base_config()
        .with_general_rate_limit(RateLimitRule::new(Duration::from_secs(60), 1));
    let app = create_test_router(Some(config)).await;

    let courses = || {
        request_from(CLIENT)
            .uri("/api/courses")
            .header("origin", ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap()
    };

    app.clone().oneshot(courses()).await.unwrap();
    let response = app.oneshot(courses()).await.unwrap();

    // Browsers can only read the 429 when the CORS headers are present.
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        ALLOWED_ORIGIN
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_sanitized_login_attempts_still_count_as_failures() {
    let config = create_base_config().with_error_rate(Duration::from_secs(900), 3);
    let fluent = create_test_fluent(Some(config)).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    let injection = || {
        request_from(CLIENT)
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"email":{"$gt":""},"password":{"$gt":""}}"#))
            .unwrap()
    };

    for _ in 0..3 {
        let response = app.clone().oneshot(injection()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.oneshot(injection()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        get_body_json(response).await["message"],
        "Too many failed requests from this IP, please try again later."
    );
    assert_eq!(stores.auth.timestamps(CLIENT_IP).len(), 3);
}

#[tokio::test]
async fn test_oversized_upload_never_reaches_upload_budget() {
    let config = create_base_config().with_max_payload_size_bytes(64);
    let fluent = create_test_fluent(Some(config)).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    let response = app
        .oneshot(
            request_from(CLIENT)
                .method("POST")
                .uri("/api/upload/file")
                .header("content-type", "application/octet-stream")
                .header("content-length", "65")
                .body(Body::from(vec![0u8; 65]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        get_body_json(response).await,
        json!({"success": false, "message": "Request entity too large", "maxSize": "64 bytes"})
    );
    assert!(stores.upload.is_empty());
}

#[tokio::test]
async fn test_denied_origin_is_refused_before_throttling() {
    let config = create_base_config().with_error_rate(Duration::from_secs(900), 1);
    let fluent = create_test_fluent(Some(config)).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(
                request_from(CLIENT)
                    .uri("/api/profile")
                    .header("origin", "http://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    // Origin denials run before the circuit and are not recorded by it.
    assert!(stores.errors.is_empty());
    assert!(stores.general.is_empty());
}
