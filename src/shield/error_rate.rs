use super::{Filter, RequestContext, Verdict, WindowStore};
use crate::{Error, ErrorRateConfig};
use axum::response::Response;
use std::time::Instant;

/// Throttles clients that keep producing error responses.
///
/// Every response with status `>= 400` that passes back through this filter
/// is recorded against the client. Once `max_errors` fall inside the
/// trailing window, further requests are refused with `429` until old
/// entries age out. Its own rejections are not recorded.
#[derive(Debug, Clone)]
pub struct ErrorRateCircuit {
    config: ErrorRateConfig,
    store: WindowStore,
}

impl ErrorRateCircuit {
    pub fn new(config: ErrorRateConfig, store: WindowStore) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }
}

impl Filter for ErrorRateCircuit {
    fn name(&self) -> &'static str {
        "error-rate"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict {
        let errors = self
            .store
            .count(ctx.identity(), self.config.window, ctx.started_at());
        if errors < self.config.max_errors as usize {
            return Verdict::Continue;
        }

        tracing::warn!(
            identity = %ctx.identity(),
            method = %ctx.method(),
            path = %ctx.path(),
            errors,
            "Too many failed requests, client throttled"
        );
        Verdict::Terminate(Error::too_many_errors(self.config.message.clone()))
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        if response.status().as_u16() >= 400 {
            self.store
                .record(ctx.identity(), self.config.window, Instant::now());
        }
    }
}
