//! Tests for the slow-request logger and the security audit log

use crate::fluent::tests::{CLIENT, create_base_config, get_request, request_from};
use crate::{Config, FluentRouter, HttpMiddleware};
use axum::{Router, body::Body, http::StatusCode, routing::get};
use std::time::Duration;
use tower::ServiceExt;
use tracing_test::traced_test;

async fn create_router_with_slow_route(config: Config) -> Router {
    FluentRouter::without_state(config)
        .unwrap()
        .route(
            "/api/reports",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(60)).await;
                "report"
            }),
        )
        .route("/api/fast", get(|| async { "fast" }))
        .route("/api/secret", get(|| async { StatusCode::FORBIDDEN }))
        .setup_middleware()
        .await
        .unwrap()
        .into_inner()
}

#[tokio::test]
#[traced_test]
async fn test_slow_request_is_logged() {
    let config = create_base_config()
        .with_slow_request_thresholds(Duration::from_millis(20), Duration::from_secs(5));
    let app = create_router_with_slow_route(config).await;

    let response = app.oneshot(get_request("/api/reports")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(logs_contain("Slow request"));
    assert!(logs_contain("/api/reports"));
    assert!(!logs_contain("very slow request"));
}

#[tokio::test]
#[traced_test]
async fn test_fast_request_is_not_logged() {
    let app = create_router_with_slow_route(create_base_config()).await;

    let response = app.oneshot(get_request("/api/fast")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!logs_contain("Slow request"));
}

#[tokio::test]
#[traced_test]
async fn test_audit_logs_very_slow_requests() {
    let config = create_base_config()
        .with_slow_request_thresholds(Duration::from_secs(1), Duration::from_millis(20));
    let app = create_router_with_slow_route(config).await;

    app.oneshot(get_request("/api/reports")).await.unwrap();

    assert!(logs_contain("Security event: very slow request"));
}

#[tokio::test]
#[traced_test]
async fn test_audit_logs_error_responses() {
    let app = create_router_with_slow_route(create_base_config()).await;

    let response = app
        .oneshot(
            request_from(CLIENT)
                .uri("/api/secret")
                .header("user-agent", "curl/8.5.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(logs_contain("Security event: error response"));
    assert!(logs_contain("status=403"));
    assert!(logs_contain("curl/8.5.0"));
    assert!(logs_contain("1.2.3.4"));
}

#[tokio::test]
#[traced_test]
async fn test_audit_and_slow_logging_can_be_excluded() {
    let config = create_base_config()
        .with_slow_request_thresholds(Duration::from_millis(1), Duration::from_millis(1))
        .with_excluded_middlewares(vec![
            HttpMiddleware::SlowRequests,
            HttpMiddleware::SecurityAudit,
        ]);
    let app = create_router_with_slow_route(config).await;

    app.clone()
        .oneshot(get_request("/api/reports"))
        .await
        .unwrap();
    app.oneshot(get_request("/api/secret")).await.unwrap();

    assert!(!logs_contain("Slow request"));
    assert!(!logs_contain("Security event"));
}
