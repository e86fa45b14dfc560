//! Tests for the origin allow-list and CORS headers

use crate::fluent::tests::{
    ALLOWED_ORIGIN, CLIENT, create_base_config, create_test_fluent, create_test_router,
    get_body_json, request_from,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use tracing_test::traced_test;

fn request_with_origin(origin: &str) -> Request<Body> {
    request_from(CLIENT)
        .uri("/api/courses")
        .header("origin", origin)
        .body(Body::empty())
        .unwrap()
}

fn preflight(origin: &str) -> Request<Body> {
    request_from(CLIENT)
        .method("OPTIONS")
        .uri("/api/echo")
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_allowed_origin_is_echoed_with_credentials() {
    let app = create_test_router(None).await;
    let response = app.oneshot(request_with_origin(ALLOWED_ORIGIN)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        ALLOWED_ORIGIN
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
#[traced_test]
async fn test_unlisted_origin_is_forbidden() {
    let app = create_test_router(None).await;
    let response = app
        .oneshot(request_with_origin("http://evil.example"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
    assert_eq!(
        get_body_json(response).await,
        json!({"success": false, "message": "Not allowed by CORS"})
    );
    assert!(logs_contain("CORS origin denied"));
}

#[tokio::test]
async fn test_origin_match_is_exact() {
    let app = create_test_router(None).await;

    for origin in [
        "http://localhost:3000/",
        "https://localhost:3000",
        "http://localhost:30001",
        "HTTP://LOCALHOST:3000",
    ] {
        let response = app.clone().oneshot(request_with_origin(origin)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "origin {origin}");
    }
}

#[tokio::test]
async fn test_requests_without_origin_pass() {
    let app = create_test_router(None).await;
    let response = app
        .oneshot(
            request_from(CLIENT)
                .uri("/api/courses")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let app = create_test_router(None).await;
    let response = app.oneshot(preflight(ALLOWED_ORIGIN)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        ALLOWED_ORIGIN
    );
    let methods = response.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"), "allowed methods: {methods}");
}

#[tokio::test]
async fn test_preflight_from_unlisted_origin_is_forbidden() {
    let app = create_test_router(None).await;
    let response = app.oneshot(preflight("http://evil.example")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_denied_origin_does_not_consume_rate_limit() {
    let fluent = create_test_fluent(None).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    app.oneshot(request_with_origin("http://evil.example"))
        .await
        .unwrap();

    assert!(stores.general.is_empty());
    assert!(stores.errors.is_empty());
}

#[tokio::test]
async fn test_configured_origins_replace_the_default() {
    let config = create_base_config().with_allowed_origins(["https://hub.example.edu"]);
    let app = create_test_router(Some(config)).await;

    let response = app
        .clone()
        .oneshot(request_with_origin("https://hub.example.edu"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(request_with_origin(ALLOWED_ORIGIN)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
