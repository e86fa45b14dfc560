//! # campus-shield
//!
//! The request security pipeline of the student-hub backend, built on Axum and
//! Tokio and configured through TOML.
//!
//! Every inbound request passes an ordered chain of independent filters
//! before it reaches routing: origin allow-list, payload size guard, input
//! sanitizer, suspicious-content scanner and sliding-window rate limiting.
//! Responses travel back through the same filters, which add security headers,
//! feed the per-client error-rate circuit and log slow requests.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::{get, post}};
//! use campus_shield::{Config, FluentRouter, Result, RouteGuard};
//!
//! async fn courses() -> &'static str {
//!     "[]"
//! }
//!
//! async fn login() -> &'static str {
//!     "{}"
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default(); // Loads from config/{RUST_ENV}.toml
//!     config.setup_tracing();
//!
//!     let auth = Router::new().route("/login", post(login));
//!
//!     FluentRouter::without_state(config)?
//!         .route("/api/courses", get(courses))
//!         .nest_guarded("/api/auth", RouteGuard::Auth, auth)
//!         .setup_middleware()
//!         .await?
//!         .start()
//!         .await
//! }
//! ```
//!
//! With `config/dev.toml`:
//! ```toml
//! [http]
//! bind_port = 5000
//! max_payload_size_bytes = "10MiB"
//!
//! [http.cors]
//! allowed_origins = ["http://localhost:3000"]
//!
//! [security.rate_limits.auth]
//! window = "15m"
//! max_requests = 50
//! ```
//!
//! Run with `RUST_ENV=dev cargo run`.
//!
//! # What You Get
//!
//! | Filter | Behaviour | Default |
//! |--------|-----------|---------|
//! | Origin policy | Exact allow-list, `403` otherwise | `http://localhost:3000` |
//! | Payload size guard | `413` when `Content-Length` is too large | 10 MiB |
//! | Sanitizer | Strips `$…` and `__…` keys from body and query | Enabled |
//! | Content scanner | Warns on script tags, `javascript:` and inline handlers | Enabled |
//! | Rate limiting | Sliding window per client | 500 / 15 min |
//! | Route guards | Auth, admin and upload budgets | 50, 50, 10 |
//! | Error-rate circuit | `429` after repeated error responses | 10 / 15 min |
//! | Security headers | CSP, HSTS, nosniff, X-Frame-Options | Enabled |
//! | Slow requests | Warnings above 1 s, audit above 5 s | Enabled |
//!
//! # Cargo Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `security-headers` | `X-Content-Type-Options` and `X-Frame-Options` via Helmet |
//! | `compression` | Response compression honouring `X-No-Compression` |
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Configuration loading and validation ([`Config`]) |
//! | [`shield`] | Filters and the pipeline driver ([`Pipeline`], [`ShieldLayer`]) |
//! | [`fluent`] | Router builder and middleware setup ([`FluentRouter`]) |
//! | [`error`] | Error types and rejection bodies ([`Error`]) |
//! | [`utils`] | Request ids and config templating |
//!
//! # Building Blocks
//!
//! The filters work on plain `serde_json` values and can be used on their own:
//!
//! ```rust
//! use campus_shield::{sanitize, scan};
//! use serde_json::json;
//!
//! let clean = sanitize(&json!({"email": "a@b.edu", "password": {"$ne": null}}));
//! assert_eq!(clean, json!({"email": "a@b.edu", "password": {}}));
//!
//! let findings = scan(&json!({"bio": "<script>alert(1)</script>"}), "body");
//! assert_eq!(findings[0].path, "body.bio");
//! ```
//!
//! ## Middleware Control
//!
//! ```toml
//! [http.middleware]
//! exclude = ["content-scan", "compression"]
//! ```
mod config;
mod error;
mod fluent;
mod shield;
mod utils;

pub use config::*;
pub use error::*;
pub use fluent::*;
pub use shield::*;
pub use utils::*;

pub type Result<T> = std::result::Result<T, Error>;
