//! Observability middleware: request ids and request spans.

use super::router::FluentRouter;
use crate::{HttpMiddleware, client_identity, utils::RequestIdGenerator};

use {
    axum::body::Body,
    http::{HeaderName, Request},
    tower_http::{
        request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
        trace::TraceLayer as TowerHTTPLayer,
    },
};

impl<State> FluentRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Sets up HTTP request/response logging middleware.
    ///
    /// Every request runs inside an `http_request` span carrying the method,
    /// uri, request id and client identity, so that the warnings emitted by
    /// the security filters can be correlated with the request that
    /// triggered them. Log output format is controlled by the
    /// `logging.format` configuration.
    #[must_use]
    pub fn setup_logging(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Logging) {
            return self;
        }

        let trust_proxy = self.config.security.trust_proxy;
        self.inner = self
            .inner
            .layer(
                TowerHTTPLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    let client =
                        client_identity(request.headers(), request.extensions(), trust_proxy);

                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                        client = %client,
                    )
                }),
            );

        self
    }

    /// Sets up request ID generation and propagation.
    ///
    /// Generates or preserves the `x-request-id` header and copies it to the
    /// response. Must wrap [`FluentRouter::setup_logging`] so the span sees
    /// the id.
    #[must_use]
    pub fn setup_request_id(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::RequestId) {
            return self;
        }

        let x_request_id = HeaderName::from_static("x-request-id");
        self.inner = self
            .inner
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, RequestIdGenerator));
        self
    }
}
