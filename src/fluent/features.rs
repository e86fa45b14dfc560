//! Feature middleware: timeouts, compression, CORS, security headers and the liveness probe.

use super::router::FluentRouter;
use crate::HttpMiddleware;

use {
    axum::routing::get,
    http::{HeaderName, HeaderValue, StatusCode},
    tower_http::{cors::CorsLayer, timeout::TimeoutLayer},
};

#[cfg(feature = "compression")]
use {
    axum::{extract::Request, middleware},
    http::header::ACCEPT_ENCODING,
    tower_http::{compression::CompressionLayer, decompression::RequestDecompressionLayer},
};

#[cfg(feature = "security-headers")]
use axum_helmet::{Helmet, HelmetLayer};

/// Request header that opts a client out of response compression.
#[cfg(feature = "compression")]
const X_NO_COMPRESSION: &str = "x-no-compression";

impl<State> FluentRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Sets up request timeout middleware.
    ///
    /// Aborts requests that take longer than the configured duration with a
    /// `408 Request Timeout` response.
    ///
    /// # Configuration
    ///
    /// ```toml
    /// [http]
    /// request_timeout = "30s"  # Optional, uses humantime format
    /// ```
    #[must_use]
    pub fn setup_timeout(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Timeout) {
            return self;
        }

        if let Some(timeout) = self.config.http.request_timeout {
            self.inner = self.inner.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }
        self
    }

    /// Sets up the Helmet security headers.
    ///
    /// Adds `X-Content-Type-Options: nosniff` and `X-Frame-Options`. The
    /// Content-Security-Policy and HSTS headers come from the security
    /// pipeline.
    ///
    /// # Configuration
    ///
    /// ```toml
    /// [http]
    /// x_content_type_nosniff = true  # Default
    /// x_frame_options = "DENY"       # Default: DENY, SAMEORIGIN, or URL
    /// ```
    #[cfg(feature = "security-headers")]
    #[must_use]
    pub fn setup_helmet(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::SecurityHeaders) {
            return self;
        }

        let mut helmet = Helmet::new();
        if self.config.http.x_content_type_nosniff {
            helmet = helmet.add(helmet_core::XContentTypeOptions::nosniff());
        }
        let x_frame = match &self.config.http.x_frame_options.0 {
            crate::XFrameOptions::Deny => axum_helmet::XFrameOptions::Deny,
            crate::XFrameOptions::SameOrigin => axum_helmet::XFrameOptions::SameOrigin,
            crate::XFrameOptions::AllowFrom(url) => {
                axum_helmet::XFrameOptions::AllowFrom(url.clone())
            }
        };
        helmet = helmet.add(x_frame);
        self.inner = self.inner.layer(
            HelmetLayer::try_from(helmet).expect("helmet header values must be valid"),
        );
        self
    }

    /// No-op when `security-headers` feature is disabled.
    #[cfg(not(feature = "security-headers"))]
    #[must_use]
    pub fn setup_helmet(self) -> Self {
        self
    }

    /// Sets up request decompression and response compression.
    ///
    /// Clients that send an `X-No-Compression` header receive uncompressed
    /// responses regardless of their `Accept-Encoding`.
    ///
    /// # Configuration
    ///
    /// ```toml
    /// [http]
    /// support_compression = true  # Default
    /// ```
    #[cfg(feature = "compression")]
    #[must_use]
    pub fn setup_compression(mut self) -> Self {
        if self.config.http.support_compression
            && self.is_middleware_enabled(HttpMiddleware::Compression)
        {
            self.inner = self
                .inner
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new())
                .layer(middleware::map_request(honor_no_compression));
        }
        self
    }

    /// No-op when `compression` feature is disabled.
    #[cfg(not(feature = "compression"))]
    #[must_use]
    pub fn setup_compression(self) -> Self {
        if self.config.http.support_compression {
            tracing::warn!(
                "Compression is enabled in config but the 'compression' feature is not enabled. \
                 Add `compression` to your Cargo.toml features to enable compression support."
            );
        }
        self
    }

    /// Sets up the CORS response layer for the configured origin allow-list.
    ///
    /// Answers preflight requests and adds the CORS headers for listed
    /// origins. Unlisted origins never reach this layer: the origin policy of
    /// the security pipeline refuses them with `403`.
    ///
    /// # Configuration
    ///
    /// ```toml
    /// [http.cors]
    /// allow_credentials = true
    /// allowed_origins = ["http://localhost:3000"]
    /// allowed_methods = ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
    /// allowed_headers = ["content-type", "authorization"]
    /// exposed_headers = ["x-request-id"]
    /// max_age = "10m"
    /// ```
    #[must_use]
    pub fn setup_cors(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Cors) {
            return self;
        }

        let cors_config = &self.config.http.cors;
        let origins: Vec<HeaderValue> = cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        let methods: Vec<http::Method> = cors_config
            .allowed_methods
            .iter()
            .map(|m| m.0.clone())
            .collect();
        let headers: Vec<HeaderName> = cors_config
            .allowed_headers
            .iter()
            .map(|h| h.0.clone())
            .collect();
        let exposed: Vec<HeaderName> = cors_config
            .exposed_headers
            .iter()
            .map(|h| h.0.clone())
            .collect();

        let mut cors = CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .expose_headers(exposed);

        if let Some(max_age) = cors_config.max_age {
            cors = cors.max_age(max_age);
        }
        if cors_config.allow_credentials {
            cors = cors.allow_credentials(true);
        }

        self.inner = self.inner.layer(cors);
        self
    }

    /// Adds the liveness endpoint.
    ///
    /// Always answers `200 OK` while the process is running. It is added
    /// outside the security pipeline so that probes are never throttled.
    ///
    /// # Configuration
    ///
    /// ```toml
    /// [http]
    /// liveness_route = "/api/health"  # Default
    /// ```
    #[must_use]
    pub fn setup_liveness(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Liveness) {
            return self;
        }

        let liveness_route = self.config.http.liveness_route.clone();
        self.inner = self.inner.route(
            &liveness_route,
            get(|| async { axum::Json(serde_json::json!({ "status": "OK" })) }),
        );
        self
    }
}

/// Drops `Accept-Encoding` from requests that carry `X-No-Compression`.
#[cfg(feature = "compression")]
async fn honor_no_compression(mut request: Request) -> Request {
    if request.headers().contains_key(X_NO_COMPRESSION) {
        request.headers_mut().remove(ACCEPT_ENCODING);
    }
    request
}
