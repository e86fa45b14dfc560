//! Student Hub Example
//!
//! A small student-hub API behind the full security pipeline: public course
//! listings, a login route with its own budget, an admin area restricted to
//! one address and a throttled upload endpoint.
//!
//! Run with:
//! ```bash
//! cargo run --example student_hub
//! ```
//!
//! Then test:
//! ```bash
//! # Reserved keys are stripped before the handler sees them
//! curl -s -X POST -H 'content-type: application/json' \
//!   -d '{"email":"a@hub.edu","password":{"$ne":null}}' http://localhost:3000/api/echo
//!
//! # Ten failed logins, then the error-rate circuit answers 429
//! for i in {1..11}; do curl -s -X POST http://localhost:3000/api/auth/login; echo; done
//!
//! # Unlisted origins are refused
//! curl -s -H 'Origin: https://evil.example' http://localhost:3000/api/courses
//!
//! # Declared bodies above 10MB are refused before they are read
//! curl -s -X POST -H 'content-length: 10485761' http://localhost:3000/api/upload/avatar
//! ```

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use campus_shield::{Config, FluentRouter, Result, RouteGuard};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct Course {
    id: &'static str,
    title: &'static str,
    seats: u32,
}

async fn list_courses() -> Json<Vec<Course>> {
    Json(vec![
        Course {
            id: "MATH 221",
            title: "Linear Algebra",
            seats: 40,
        },
        Course {
            id: "CHEM 201",
            title: "Organic Chemistry",
            seats: 25,
        },
    ])
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn login() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"success": false, "message": "Invalid credentials"})),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let config: Config = r#"
[http]
bind_addr = "127.0.0.1"
bind_port = 3000
max_payload_size_bytes = "10MiB"
request_timeout = "30s"
liveness_route = "/api/health"

[http.cors]
allowed_origins = ["http://localhost:3000"]
allow_credentials = true
max_age = "10m"

[security]
admin_ip_allowlist = ["127.0.0.1"]

[security.slow_requests]
threshold = "1s"
audit_threshold = "5s"

[logging]
format = "default"
"#
    .parse()?;

    config.setup_tracing();

    let api = Router::new()
        .route("/api/courses", get(list_courses))
        .route("/api/echo", post(echo));
    let auth = Router::new().route("/login", post(login));
    let admin = Router::new().route("/stats", get(|| async { "42 active students" }));
    let uploads = Router::new().route("/avatar", post(|| async { "stored" }));

    println!("Starting student hub on http://127.0.0.1:3000");
    println!("  - general limit: 500 requests / 15 min");
    println!("  - auth limit:     50 requests / 15 min");
    println!("  - upload limit:   10 uploads / hour");
    println!("  - admin routes:   127.0.0.1 only");

    FluentRouter::without_state(config)?
        .merge(api)
        .nest_guarded("/api/auth", RouteGuard::Auth, auth)
        .nest_guarded("/api/admin", RouteGuard::Admin, admin)
        .nest_guarded("/api/upload", RouteGuard::Upload, uploads)
        .setup_middleware()
        .await?
        .start()
        .await
}
