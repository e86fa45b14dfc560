use super::{Filter, RequestContext, Verdict};
use axum::response::Response;
use http::header::USER_AGENT;
use std::time::{Duration, Instant};

/// Warns about requests that take longer than a threshold.
///
/// The audit variant additionally warns about every error response
/// (status `>= 400`) with the client, method, path and user agent. Neither
/// variant touches the response.
#[derive(Debug, Clone)]
pub struct SlowRequestLogger {
    threshold: Duration,
    audit: bool,
}

impl SlowRequestLogger {
    /// Performance logger.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            audit: false,
        }
    }

    /// Security audit logger.
    pub fn audit(threshold: Duration) -> Self {
        Self {
            threshold,
            audit: true,
        }
    }

    fn observe(&self, ctx: &RequestContext, response: &Response, finished_at: Instant) {
        let duration = finished_at.saturating_duration_since(ctx.started_at());
        let duration_ms = duration.as_millis() as u64;
        let status = response.status().as_u16();

        if self.audit && status >= 400 {
            tracing::warn!(
                identity = %ctx.identity(),
                method = %ctx.method(),
                path = %ctx.path(),
                status,
                user_agent = ctx.header_str(USER_AGENT).unwrap_or("-"),
                "Security event: error response"
            );
        }

        if duration > self.threshold {
            if self.audit {
                tracing::warn!(
                    identity = %ctx.identity(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    duration_ms,
                    "Security event: very slow request"
                );
            } else {
                tracing::warn!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    duration_ms,
                    "Slow request"
                );
            }
        }
    }
}

impl Filter for SlowRequestLogger {
    fn name(&self) -> &'static str {
        if self.audit {
            "security-audit"
        } else {
            "slow-requests"
        }
    }

    fn on_request(&self, _ctx: &mut RequestContext) -> Verdict {
        Verdict::Continue
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        self.observe(ctx, response, Instant::now());
    }
}
