//! Orchestration and router delegation: setup_middleware(), start(), layer(), route(), etc.

use super::router::FluentRouter;
use crate::Result;

use {
    axum::{Router, body::Body, routing::Route},
    http::Request,
    std::{convert::Infallible, net::SocketAddr},
    tokio::signal,
    tokio_util::sync::CancellationToken,
    tower::{Layer, Service},
};

impl<State> FluentRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Sets up all standard middleware layers in the correct order.
    ///
    /// Call this after adding routes (including [`FluentRouter::nest_guarded`]
    /// groups): layers only wrap routes that already exist.
    ///
    /// # Middleware Order
    ///
    /// The **last layer added is the outermost layer** and executes **first**
    /// on incoming requests. From innermost to outermost:
    ///
    /// 1. **CORS** - Preflight answers and CORS headers for allowed origins
    /// 2. **Security pipeline** - Origin policy, error-rate circuit, size guard,
    ///    sanitizer, scanner, general limiter, CSP/HSTS and slow-request logs
    /// 3. **Helmet** - `X-Content-Type-Options` and `X-Frame-Options`
    /// 4. **Compression** - Request decompression before the sanitizer reads
    ///    bodies; response compression unless `X-No-Compression` is sent
    /// 5. **Logging** - Request spans
    /// 6. **Timeout** - Request timeout (optional)
    /// 7. **Request ID** - Generate/extract ID before the span is opened
    /// 8. **Liveness** - Health probe, outside the security pipeline
    /// 9. **Panic catching** - Catch ALL panics from inner layers (outermost)
    ///
    /// Use `[http.middleware] exclude/include` to leave layers out rather than
    /// calling the individual `setup_*` methods yourself.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` leaves room for layers whose setup
    /// can fail.
    pub async fn setup_middleware(self) -> Result<Self> {
        const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");
        const VERSION: &str = env!("CARGO_PKG_VERSION");
        tracing::info!("Starting {PACKAGE_NAME} version {VERSION}...");

        let router = self
            .setup_cors() // 1. CORS handling
            .setup_shield() // 2. Security pipeline
            .setup_helmet() // 3. Helmet headers
            .setup_compression() // 4. Compression/decompression
            .setup_logging() // 5. Request/response logging
            .setup_timeout() // 6. Request timeout (optional)
            .setup_request_id() // 7. Request ID
            .setup_liveness() // 8. Liveness endpoint
            .setup_catch_panic(); // 9. Outermost - panic recovery

        Ok(router)
    }

    /// Starts the HTTP server based on the current configuration.
    ///
    /// The server is started with `ConnectInfo<SocketAddr>` so that the
    /// security pipeline can identify clients by their peer address.
    ///
    /// # Graceful Shutdown
    ///
    /// On SIGTERM or SIGINT the cancellation token is triggered, new
    /// connections are refused and in-flight requests are given
    /// `http.shutdown_timeout` to complete before the server exits anyway.
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.config.http.full_bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Bound to {}", &bind_addr);
        tracing::info!("Waiting for connections");
        tracing::info!(
            "General rate limit: {} requests per {}",
            self.config.security.rate_limits.general.max_requests,
            humantime::format_duration(self.config.security.rate_limits.general.window)
        );

        let shutdown_timeout = self.config.http.shutdown_timeout;
        let token = self.shutdown_token.clone();

        let service = self
            .inner
            .with_state(self.state)
            .into_make_service_with_connect_info::<SocketAddr>();

        let serve_future = axum::serve(listener, service)
            .with_graceful_shutdown(shutdown_signal(token.clone()));

        // The timeout only starts once a shutdown signal was received.
        tokio::select! {
            result = serve_future => {
                tracing::info!("Graceful shutdown completed");
                result?;
            }
            _ = async {
                token.cancelled().await;
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
            }
        }

        Ok(())
    }

    /// Adds a custom Tower middleware layer to the router.
    ///
    /// Forwards to `axum::Router::layer()`.
    ///
    /// ```rust,no_run
    /// use tower::limit::ConcurrencyLimitLayer;
    /// # use campus_shield::{Config, FluentRouter};
    /// # fn example() -> campus_shield::Result<()> {
    /// let router = FluentRouter::without_state(Config::default())?
    ///     .layer(ConcurrencyLimitLayer::new(100));
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request<Body>> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request<Body>>>::Response: axum::response::IntoResponse + 'static,
        <L::Service as Service<Request<Body>>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request<Body>>>::Future: Send + 'static,
    {
        self.inner = self.inner.layer(layer);
        self
    }

    /// Adds a route at `path`.
    ///
    /// ```
    /// use campus_shield::{Config, FluentRouter};
    /// use axum::routing::get;
    ///
    /// async fn courses() -> &'static str {
    ///     "[]"
    /// }
    ///
    /// # async fn example() {
    /// let router = FluentRouter::without_state(Config::default())
    ///     .unwrap()
    ///     .route("/api/courses", get(courses))
    ///     .into_inner();
    /// # }
    /// ```
    #[must_use]
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter<State>) -> Self {
        self.inner = self.inner.route(path, route);
        self
    }

    /// Adds a layer that only wraps the routes added so far.
    ///
    /// Forwards to `axum::Router::route_layer()`.
    #[must_use]
    pub fn route_layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request<Body>> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request<Body>>>::Response: axum::response::IntoResponse + 'static,
        <L::Service as Service<Request<Body>>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request<Body>>>::Future: Send + 'static,
    {
        self.inner = self.inner.route_layer(layer);
        self
    }

    /// Nests another router under `path` without a route guard.
    ///
    /// Use [`FluentRouter::nest_guarded`] for the auth, admin and upload
    /// groups.
    #[must_use]
    pub fn nest(mut self, path: &str, router: Router<State>) -> Self {
        self.inner = self.inner.nest(path, router);
        self
    }

    /// Nests a Tower service under `path`.
    #[must_use]
    pub fn nest_service<T>(mut self, path: &str, service: T) -> Self
    where
        T: Service<Request<Body>, Response = axum::response::Response, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        T::Future: Send + 'static,
    {
        self.inner = self.inner.nest_service(path, service);
        self
    }

    /// Merges the routes of `other` into this router, without a prefix.
    ///
    /// ```rust,no_run
    /// # use axum::Router;
    /// # use campus_shield::{Config, FluentRouter};
    /// # fn example() -> campus_shield::Result<()> {
    /// # fn course_routes() -> Router { Router::new() }
    /// # fn announcement_routes() -> Router { Router::new() }
    /// FluentRouter::without_state(Config::default())?
    ///     .merge(course_routes())
    ///     .merge(announcement_routes());
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn merge(mut self, other: Router<State>) -> Self {
        self.inner = self.inner.merge(other);
        self
    }

    /// Adds a Tower service at an exact path.
    #[must_use]
    pub fn route_service<T>(mut self, path: &str, service: T) -> Self
    where
        T: Service<Request<Body>, Response = axum::response::Response, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        T::Future: Send + 'static,
    {
        self.inner = self.inner.route_service(path, service);
        self
    }

    /// Consumes the `FluentRouter` and returns the underlying `axum::Router`.
    ///
    /// The idle-client sweeper stops when the `FluentRouter` is dropped, so
    /// tracked clients are only forgotten lazily afterwards.
    pub fn into_inner(self) -> Router<State> {
        self.inner
    }
}

/// Waits for Ctrl+C or SIGTERM, then cancels `token`.
///
/// If a signal handler cannot be installed, a warning is logged and that
/// signal is ignored so the server keeps running.
pub(crate) async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::debug!("Ctrl+C signal received"),
            Err(err) => {
                tracing::warn!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal_handler) => {
                signal_handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = token.cancelled() => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
    token.cancel();
}
