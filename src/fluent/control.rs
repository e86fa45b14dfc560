//! Traffic control middleware: the security pipeline, guarded route groups and panic catching.

use super::router::FluentRouter;
use crate::{
    Error, ErrorRateCircuit, HttpMiddleware, OriginPolicy, PayloadSizeGuard, Pipeline, RateLimiter,
    RouteGuard, Sanitizer, SecurityHeadersPolicy, ShieldLayer, SlowRequestLogger,
    SuspiciousContentScanner,
};

use {
    axum::{Router, extract::DefaultBodyLimit, response::IntoResponse},
    std::time::Instant,
    tokio_util::task::AbortOnDropHandle,
    tower_http::catch_panic::CatchPanicLayer,
};

impl<State> FluentRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Builds the main security pipeline from the configuration.
    ///
    /// Request order:
    ///
    /// 1. Security headers (response only)
    /// 2. Security audit (response only)
    /// 3. Origin allow-list
    /// 4. Error-rate circuit
    /// 5. Payload size guard
    /// 6. Sanitizer
    /// 7. Suspicious-content scanner
    /// 8. General rate limiter
    /// 9. Slow-request logger (response only)
    ///
    /// Responses visit the admitting filters in reverse, so headers and the
    /// audit log also apply to rejections produced by later filters.
    pub fn shield_pipeline(&self) -> Pipeline {
        let security = &self.config.security;
        let http = &self.config.http;

        Pipeline::new()
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::SecurityHeaders),
                SecurityHeadersPolicy::default(),
            )
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::SecurityAudit),
                SlowRequestLogger::audit(security.slow_requests.audit_threshold),
            )
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::Cors),
                OriginPolicy::from_config(&http.cors),
            )
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::ErrorRate),
                ErrorRateCircuit::new(security.error_rate.clone(), self.stores.errors.clone()),
            )
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::MaxPayloadSize),
                PayloadSizeGuard::new(http.max_payload_size_bytes.as_u64()),
            )
            .with_if(self.is_middleware_enabled(HttpMiddleware::Sanitize), Sanitizer)
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::ContentScan),
                SuspiciousContentScanner,
            )
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::RateLimiting),
                RateLimiter::new(
                    "general",
                    security.rate_limits.general.clone(),
                    self.stores.general.clone(),
                ),
            )
            .with_if(
                self.is_middleware_enabled(HttpMiddleware::SlowRequests),
                SlowRequestLogger::new(security.slow_requests.threshold),
            )
    }

    /// Installs the main security pipeline in front of every route.
    ///
    /// Also raises axum's extractor body limit to the configured payload
    /// ceiling and starts the background task that forgets idle clients.
    ///
    /// # Configuration
    ///
    /// ```toml
    /// [security]
    /// trust_proxy = false
    /// sweep_interval = "60s"
    ///
    /// [security.rate_limits.general]
    /// window = "15m"
    /// max_requests = 500
    ///
    /// [security.error_rate]
    /// window = "15m"
    /// max_errors = 10
    /// ```
    ///
    /// This middleware is automatically included in `setup_middleware()`.
    #[must_use]
    pub fn setup_shield(mut self) -> Self {
        let pipeline = self.shield_pipeline();
        if pipeline.is_empty() {
            return self;
        }

        tracing::debug!(filters = ?pipeline, "Installing security pipeline");

        let max_payload = self.config.http.max_payload_size_bytes.as_u64() as usize;
        let layer = ShieldLayer::new(pipeline)
            .with_trust_proxy(self.config.security.trust_proxy)
            .with_body_limit(max_payload);

        if self.is_middleware_enabled(HttpMiddleware::MaxPayloadSize) {
            self.inner = self.inner.layer(DefaultBodyLimit::max(max_payload));
        }
        self.inner = self.inner.layer(layer);
        self.spawn_sweeper();
        self
    }

    /// Nests `router` at `path` behind the limiter of `guard`.
    ///
    /// The guard runs after the main pipeline, so guarded routes are counted
    /// by both the general limiter and their group limiter. Admin groups are
    /// additionally restricted to `security.admin_ip_allowlist` when it is
    /// non-empty.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use axum::{Router, routing::post};
    /// use campus_shield::{Config, FluentRouter, RouteGuard};
    /// # fn example() -> campus_shield::Result<()> {
    ///
    /// let uploads = Router::new().route("/avatar", post(|| async { "stored" }));
    ///
    /// let app = FluentRouter::without_state(Config::default())?
    ///     .nest_guarded("/api/upload", RouteGuard::Upload, uploads);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `router` has no routes, like `axum::Router::route_layer`.
    #[must_use]
    pub fn nest_guarded(mut self, path: &str, guard: RouteGuard, router: Router<State>) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::RouteGuards) {
            self.inner = self.inner.nest(path, router);
            return self;
        }

        let pipeline = guard.pipeline(&self.config.security, &self.stores);
        tracing::debug!(path, guard = guard.name(), filters = ?pipeline, "Guarding route group");

        let layer = ShieldLayer::new(pipeline)
            .with_trust_proxy(self.config.security.trust_proxy)
            .with_body_limit(self.config.http.max_payload_size_bytes.as_u64() as usize);

        self.inner = self.inner.nest(path, router.route_layer(layer));
        self.spawn_sweeper();
        self
    }

    /// Starts the idle-client sweeper unless it is already running.
    ///
    /// The task stops when the router is dropped or shutdown begins.
    fn spawn_sweeper(&mut self) {
        if self.sweeper_handle.is_some() {
            return;
        }

        let stores = self.stores.clone();
        let security = self.config.security.clone();
        let token = self.shutdown_token.clone();
        let interval = security.sweep_interval;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let removed = stores.sweep(&security, Instant::now());
                        tracing::debug!(
                            removed,
                            tracked = stores.tracked_identities(),
                            "Swept idle clients"
                        );
                    }
                }
            }
        });

        self.sweeper_handle = Some(AbortOnDropHandle::new(handle));
    }

    /// Sets up panic catching middleware.
    ///
    /// Catches panics in request handlers and returns a `500 Internal Server Error`
    /// response instead of crashing the server. Optionally sends panic details to
    /// a notification channel if configured with `with_panic_notification_channel()`.
    ///
    /// This middleware is automatically included in `setup_middleware()` as the
    /// outermost layer to ensure ALL panics are caught.
    #[must_use]
    pub fn setup_catch_panic(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::CatchPanic) {
            return self;
        }

        let panic_channel = self.panic_channel.clone();
        self.inner = self.inner.layer(CatchPanicLayer::custom(
            move |err: Box<dyn std::any::Any + Send + 'static>| {
                let detail = err
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| err.downcast_ref::<&str>().copied());
                let msg = match detail {
                    Some(detail) => format!("Service panicked: {detail}"),
                    None => "Service panicked with a non-string payload".to_string(),
                };

                tracing::error!("{msg}");
                if let Some(ch) = &panic_channel {
                    ch.try_send(msg).ok();
                }

                Error::internal("Internal server error").into_response()
            },
        ));
        self
    }
}
