//! Test helpers and utilities for FluentRouter tests
//!
//! These tests use `oneshot()` for fast, in-process testing without network
//! I/O. Requests carry a `ConnectInfo<SocketAddr>` extension so the security
//! pipeline can identify the client the same way it does behind
//! `into_make_service_with_connect_info`.
//!
//! ## Available Helpers
//!
//! - Configuration builders: `create_base_config()`, `create_config_with_toml()`
//! - Router builders: `create_test_fluent()`, `create_test_router()`
//! - Request helpers: `request_from()`, `get_request()`, `json_request()`
//! - Response helpers: `get_body_string()`, `get_body_json()`

use crate::{Config, FluentRouter, RouteGuard};
use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, RawQuery},
    http::{Request, StatusCode},
    response::Response,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;


/// Address used by requests that do not care about the client.
pub(crate) const CLIENT: [u8; 4] = [1, 2, 3, 4];
pub(crate) const CLIENT_IP: &str = "1.2.3.4";
pub(crate) const ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Configuration Helpers
// ============================================================================

const BASE_CONFIG_TOML: &str = r#"
[http]
bind_addr = "127.0.0.1"
bind_port = 5000
max_payload_size_bytes = "10MiB"
support_compression = false
liveness_route = "/api/health"

[http.cors]
allowed_origins = ["http://localhost:3000"]
allow_credentials = true

[logging]
format = "json"
"#;

/// Base test configuration: default limits, compression off.
pub(crate) fn create_base_config() -> Config {
    BASE_CONFIG_TOML
        .parse()
        .expect("Failed to parse test config TOML")
}

/// Base test configuration with additional TOML sections appended.
pub(crate) fn create_config_with_toml(additional_toml: &str) -> Config {
    format!("{BASE_CONFIG_TOML}\n{additional_toml}")
        .parse()
        .expect("Failed to parse test config TOML")
}

// ============================================================================
// Router Helpers
// ============================================================================

async fn echo_json(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn echo_query(RawQuery(query): RawQuery) -> String {
    query.unwrap_or_default()
}

/// Public API routes used across tests.
pub(crate) fn api_routes() -> Router {
    Router::new()
        .route(
            "/api/courses",
            get(|| async { Json(json!({"success": true, "data": []})) }),
        )
        .route("/api/echo", post(echo_json))
        .route("/api/query", get(echo_query))
        .route("/api/profile", get(|| async { StatusCode::UNAUTHORIZED }))
}

/// Login always fails, like a client guessing passwords.
pub(crate) fn auth_routes() -> Router {
    Router::new().route(
        "/login",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"success": false, "message": "Invalid credentials"})),
            )
        }),
    )
}

pub(crate) fn admin_routes() -> Router {
    Router::new().route("/stats", get(|| async { Json(json!({"users": 42})) }))
}

pub(crate) fn upload_routes() -> Router {
    Router::new().route("/file", post(|| async { "stored" }))
}

/// Builds the full student-hub test app and keeps the `FluentRouter` so
/// tests can inspect the tracking stores.
pub(crate) async fn create_test_fluent(config: Option<Config>) -> FluentRouter {
    FluentRouter::without_state(config.unwrap_or_else(create_base_config))
        .expect("Failed to create FluentRouter")
        .merge(api_routes())
        .nest_guarded("/api/auth", RouteGuard::Auth, auth_routes())
        .nest_guarded("/api/admin", RouteGuard::Admin, admin_routes())
        .nest_guarded("/api/upload", RouteGuard::Upload, upload_routes())
        .setup_middleware()
        .await
        .expect("Failed to setup middleware")
}

pub(crate) async fn create_test_router(config: Option<Config>) -> Router {
    create_test_fluent(config).await.into_inner()
}

// ============================================================================
// Request Helpers
// ============================================================================

/// Request builder carrying the peer address `ip`.
pub(crate) fn request_from(ip: [u8; 4]) -> axum::http::request::Builder {
    Request::builder().extension(ConnectInfo(SocketAddr::from((ip, 40_000))))
}

/// GET from [`CLIENT`].
pub(crate) fn get_request(uri: &str) -> Request<Body> {
    request_from(CLIENT)
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// POST with a JSON body from [`CLIENT`].
pub(crate) fn json_request(uri: &str, body: &str) -> Request<Body> {
    request_from(CLIENT)
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

// ============================================================================
// Response Helpers
// ============================================================================

pub(crate) async fn get_body_string(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

pub(crate) async fn get_body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
