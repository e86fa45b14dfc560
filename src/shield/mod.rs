//! The request security pipeline.
//!
//! A [`Pipeline`] is an ordered list of [`Filter`]s. Each request visits the
//! filters in order until one returns [`Verdict::Terminate`]; the response then
//! visits every filter that admitted the request, in reverse order. The
//! [`ShieldLayer`] runs a pipeline in front of an axum service.
//!
//! ```rust
//! use campus_shield::{
//!     OriginPolicy, Pipeline, RateLimitRule, RateLimiter, SecurityHeadersPolicy, ShieldLayer,
//!     WindowStore,
//! };
//! use std::time::Duration;
//!
//! let pipeline = Pipeline::new()
//!     .with(SecurityHeadersPolicy::default())
//!     .with(OriginPolicy::new(["https://hub.example.edu"], true))
//!     .with(RateLimiter::new(
//!         "general",
//!         RateLimitRule::new(Duration::from_secs(900), 500),
//!         WindowStore::new(),
//!     ));
//!
//! let layer = ShieldLayer::new(pipeline);
//! ```

mod context;
mod error_rate;
mod guards;
mod headers;
mod ip_allow;
mod layer;
mod origin;
mod query;
mod rate_limit;
mod sanitize;
mod scan;
mod size;
mod store;
mod timing;

pub use context::{RequestContext, UNKNOWN_IDENTITY, client_identity};
pub use error_rate::ErrorRateCircuit;
pub use guards::{GuardStores, RouteGuard};
pub use headers::{CONTENT_SECURITY_POLICY, SecurityHeadersPolicy, STRICT_TRANSPORT_SECURITY};
pub use ip_allow::IpAllowList;
pub use layer::{ShieldLayer, ShieldService};
pub use origin::OriginPolicy;
pub use rate_limit::RateLimiter;
pub use sanitize::{Sanitizer, contains_reserved, is_reserved_key, sanitize};
pub use scan::{Finding, PREVIEW_CHARS, SuspiciousContentScanner, scan};
pub use size::PayloadSizeGuard;
pub use store::WindowStore;
pub use timing::SlowRequestLogger;

use crate::Error;
use axum::response::Response;
use std::{fmt, sync::Arc};

/// When a filter needs to run relative to body buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Only the request head is inspected.
    #[default]
    Head,
    /// The decoded body must be available.
    Payload,
}

/// Outcome of a filter's request hook.
#[derive(Debug)]
pub enum Verdict {
    Continue,
    /// Stop processing and answer with this rejection.
    Terminate(Error),
}

/// A single policy in the pipeline.
pub trait Filter: Send + Sync + 'static {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    fn stage(&self) -> Stage {
        Stage::Head
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict;

    /// Runs after the inner service (or a later filter) produced `response`.
    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// Result of running the request hooks.
#[derive(Debug)]
pub struct Admission {
    /// Number of filters that let the request through.
    pub admitted: usize,
    /// The rejection, if a filter terminated the request.
    pub rejection: Option<Error>,
}

/// Ordered filter chain.
#[derive(Clone, Default)]
pub struct Pipeline {
    filters: Vec<Arc<dyn Filter>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `filter`; it runs after every filter added before it.
    #[must_use]
    pub fn with(mut self, filter: impl Filter) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Appends `filter` only when `enabled` is true.
    #[must_use]
    pub fn with_if(self, enabled: bool, filter: impl Filter) -> Self {
        if enabled { self.with(filter) } else { self }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }

    /// Runs the request hooks in order, buffering the body just before the
    /// first payload-stage filter.
    pub async fn admit(&self, ctx: &mut RequestContext) -> Admission {
        let mut payload_loaded = false;
        for (index, filter) in self.filters.iter().enumerate() {
            if filter.stage() == Stage::Payload && !payload_loaded {
                payload_loaded = true;
                if let Err(err) = ctx.load_payload().await {
                    tracing::debug!(
                        filter = filter.name(),
                        identity = %ctx.identity(),
                        "Request body rejected while buffering"
                    );
                    return Admission {
                        admitted: index,
                        rejection: Some(err),
                    };
                }
            }

            if let Verdict::Terminate(err) = filter.on_request(ctx) {
                tracing::debug!(
                    filter = filter.name(),
                    identity = %ctx.identity(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    "Request terminated"
                );
                return Admission {
                    admitted: index,
                    rejection: Some(err),
                };
            }
        }

        Admission {
            admitted: self.filters.len(),
            rejection: None,
        }
    }

    /// Runs the response hooks of the first `admitted` filters, last first.
    pub fn respond(&self, ctx: &RequestContext, admitted: usize, response: &mut Response) {
        let admitted = admitted.min(self.filters.len());
        for filter in self.filters[..admitted].iter().rev() {
            filter.on_response(ctx, response);
        }
    }
}
