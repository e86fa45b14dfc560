use super::{Filter, RequestContext, Verdict, WindowStore};
use crate::{Error, RateLimitRule};

/// Sliding-window request limiter.
///
/// Counts requests per client identity over the trailing `rule.window`. A
/// request is admitted and recorded while the count is below
/// `rule.max_requests`; afterwards it is answered with `429` and a
/// `retryAfter` equal to the window length in seconds. Rejected requests are
/// not counted.
///
/// Each limiter should own its [`WindowStore`] so that budgets stay
/// independent.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    name: &'static str,
    rule: RateLimitRule,
    store: WindowStore,
}

impl RateLimiter {
    pub fn new(name: &'static str, rule: RateLimitRule, store: WindowStore) -> Self {
        Self { name, rule, store }
    }

    pub fn rule(&self) -> &RateLimitRule {
        &self.rule
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }
}

impl Filter for RateLimiter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict {
        let admitted = self.store.try_acquire(
            ctx.identity(),
            self.rule.window,
            self.rule.max_requests,
            ctx.started_at(),
        );
        if admitted {
            return Verdict::Continue;
        }

        tracing::warn!(
            limiter = self.name,
            identity = %ctx.identity(),
            method = %ctx.method(),
            path = %ctx.path(),
            max_requests = self.rule.max_requests,
            window_secs = self.rule.window.as_secs(),
            "Rate limit exceeded"
        );
        Verdict::Terminate(
            Error::rate_limited(self.rule.message()).with_retry_after(self.rule.window),
        )
    }
}
