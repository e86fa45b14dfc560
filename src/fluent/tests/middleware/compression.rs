//! Tests for response compression and the X-No-Compression opt-out

use crate::FluentRouter;
use crate::fluent::tests::{CLIENT, create_base_config, get_body_json, request_from};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
};
use serde_json::json;
use tower::ServiceExt;

async fn create_compressing_router(enabled: bool) -> Router {
    let syllabus = "Week 1: limits and continuity. ".repeat(200);
    let config = create_base_config().with_compression(enabled);

    FluentRouter::without_state(config)
        .unwrap()
        .route(
            "/api/syllabus",
            get(move || {
                let syllabus = syllabus.clone();
                async move { syllabus }
            }),
        )
        .route("/api/notes", post(|body: String| async move { body }))
        .setup_middleware()
        .await
        .unwrap()
        .into_inner()
}

fn syllabus_request() -> axum::http::request::Builder {
    request_from(CLIENT)
        .uri("/api/syllabus")
        .header("accept-encoding", "gzip")
}

fn build(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_response_is_compressed_when_accepted() {
    let app = create_compressing_router(true).await;
    let response = app.oneshot(build(syllabus_request())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-encoding"], "gzip");
}

#[tokio::test]
async fn test_no_compression_header_opts_out() {
    let app = create_compressing_router(true).await;
    let response = app
        .oneshot(build(syllabus_request().header("x-no-compression", "1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("content-encoding"));
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.starts_with(b"Week 1"));
}

#[tokio::test]
async fn test_compression_disabled_in_config() {
    let app = create_compressing_router(false).await;
    let response = app.oneshot(build(syllabus_request())).await.unwrap();

    assert!(!response.headers().contains_key("content-encoding"));
}

#[tokio::test]
async fn test_undecodable_request_body_gets_fixed_message() {
    let app = create_compressing_router(true).await;
    let response = app
        .oneshot(
            request_from(CLIENT)
                .method("POST")
                .uri("/api/notes")
                .header("content-type", "application/json")
                .header("content-encoding", "gzip")
                .body(Body::from("this is not gzip data"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({"success": false, "message": "Failed to read request body"})
    );
}
