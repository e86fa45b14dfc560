//! Tower integration for [`Pipeline`].

use super::{Pipeline, RequestContext};
use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::{Layer, Service};

const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Layer that runs a [`Pipeline`] in front of the wrapped service.
#[derive(Debug, Clone)]
pub struct ShieldLayer {
    pipeline: Arc<Pipeline>,
    trust_proxy: bool,
    body_limit: usize,
}

impl ShieldLayer {
    /// Creates a layer using the peer address as client identity and a
    /// 10 MiB buffering ceiling.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            trust_proxy: false,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Uses the first `X-Forwarded-For` hop as client identity.
    #[must_use]
    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    /// Largest body buffered for payload-stage filters.
    #[must_use]
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl<S> Layer<S> for ShieldLayer {
    type Service = ShieldService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ShieldService {
            inner,
            pipeline: self.pipeline.clone(),
            trust_proxy: self.trust_proxy,
            body_limit: self.body_limit,
        }
    }
}

/// Service produced by [`ShieldLayer`].
#[derive(Debug, Clone)]
pub struct ShieldService<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
    trust_proxy: bool,
    body_limit: usize,
}

impl<S> Service<Request> for ShieldService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let pipeline = self.pipeline.clone();
        let trust_proxy = self.trust_proxy;
        let body_limit = self.body_limit;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut ctx = RequestContext::new(req, trust_proxy, body_limit);
            let admission = pipeline.admit(&mut ctx).await;

            let mut response = match admission.rejection {
                Some(rejection) => rejection.into_response(),
                None => inner.call(ctx.take_request()).await?,
            };

            pipeline.respond(&ctx, admission.admitted, &mut response);
            Ok(response)
        })
    }
}
