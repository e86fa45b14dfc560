//! Tests for the error-rate circuit

use crate::HttpMiddleware;
use crate::fluent::tests::{
    CLIENT, CLIENT_IP, create_base_config, create_test_fluent, create_test_router, get_body_json,
    get_request, request_from,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;

fn login_from(ip: [u8; 4]) -> Request<Body> {
    request_from(ip)
        .method("POST")
        .uri("/api/auth/login")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_repeated_failed_logins_trip_the_circuit() {
    let fluent = create_test_fluent(None).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    for attempt in 1..=10 {
        let response = app.clone().oneshot(login_from(CLIENT)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "attempt {attempt}"
        );
    }

    let response = app.oneshot(login_from(CLIENT)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        get_body_json(response).await,
        json!({
            "success": false,
            "message": "Too many failed requests from this IP, please try again later.",
        })
    );

    // The auth budget of 50 was never the reason for the rejection, and the
    // circuit refused the request before the auth limiter saw it.
    assert_eq!(stores.auth.timestamps(CLIENT_IP).len(), 10);
    assert_eq!(stores.errors.timestamps(CLIENT_IP).len(), 10);
}

#[tokio::test]
async fn test_open_circuit_blocks_every_route_for_that_client() {
    let config = create_base_config().with_error_rate(Duration::from_secs(900), 2);
    let app = create_test_router(Some(config)).await;

    for _ in 0..2 {
        app.clone()
            .oneshot(get_request("/api/profile"))
            .await
            .unwrap();
    }

    // Even a route that would succeed is refused now.
    let response = app.oneshot(get_request("/api/courses")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_other_clients_are_unaffected() {
    let config = create_base_config().with_error_rate(Duration::from_secs(900), 2);
    let app = create_test_router(Some(config)).await;

    for _ in 0..3 {
        app.clone().oneshot(login_from(CLIENT)).await.unwrap();
    }

    let response = app.oneshot(login_from([5, 6, 7, 8])).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_successful_responses_are_not_counted() {
    let fluent = create_test_fluent(None).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    for _ in 0..15 {
        let response = app
            .clone()
            .oneshot(get_request("/api/courses"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(stores.errors.is_empty());
}

#[tokio::test]
async fn test_circuit_rejections_are_not_counted() {
    let config = create_base_config().with_error_rate(Duration::from_secs(900), 1);
    let fluent = create_test_fluent(Some(config)).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    app.clone().oneshot(login_from(CLIENT)).await.unwrap();
    for _ in 0..5 {
        let response = app.clone().oneshot(login_from(CLIENT)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    assert_eq!(stores.errors.timestamps(CLIENT_IP).len(), 1);
}

#[tokio::test]
async fn test_error_rate_can_be_excluded() {
    let config = create_base_config().with_excluded_middlewares(vec![HttpMiddleware::ErrorRate]);
    let fluent = create_test_fluent(Some(config)).await;
    let stores = fluent.stores().clone();
    let app = fluent.into_inner();

    for _ in 0..20 {
        let response = app.clone().oneshot(login_from(CLIENT)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(stores.errors.is_empty());
}
