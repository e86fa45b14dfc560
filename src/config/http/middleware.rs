use crate::{Error, Result};
use serde::Deserialize;

/// Selects which layers `FluentRouter::setup_middleware` installs.
///
/// ```toml
/// [http.middleware]
/// exclude = ["compression", "slow-requests"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMiddlewareConfig {
    Include(Vec<HttpMiddleware>),
    Exclude(Vec<HttpMiddleware>),
}

impl HttpMiddlewareConfig {
    pub fn is_enabled(&self, middleware: HttpMiddleware) -> bool {
        match self {
            HttpMiddlewareConfig::Include(list) => list.contains(&middleware),
            HttpMiddlewareConfig::Exclude(list) => !list.contains(&middleware),
        }
    }

    /// Validates middleware dependencies are satisfied.
    ///
    /// # Dependencies
    ///
    /// - `Sanitize` and `ContentScan` buffer request bodies and therefore require
    ///   `MaxPayloadSize`, which rejects oversized bodies before they are read.
    pub fn validate(&self) -> Result<()> {
        for dependent in [HttpMiddleware::Sanitize, HttpMiddleware::ContentScan] {
            if self.is_enabled(dependent) && !self.is_enabled(HttpMiddleware::MaxPayloadSize) {
                return Err(Error::config(format!(
                    "{dependent:?} requires MaxPayloadSize. Remove 'max-payload-size' from the \
                     exclude list or add it to the include list."
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HttpMiddleware {
    /// Origin allow-list and CORS response headers.
    Cors,
    /// Content-Security-Policy, HSTS, nosniff and X-Frame-Options.
    SecurityHeaders,
    /// Per-client throttling driven by error responses.
    ErrorRate,
    /// Declared and actual body size ceiling.
    MaxPayloadSize,
    /// Reserved-key stripping of bodies and query strings.
    Sanitize,
    /// Suspicious-content warnings.
    ContentScan,
    /// The general per-client rate limiter.
    RateLimiting,
    /// Auth, admin and upload limiters attached with `nest_guarded`.
    RouteGuards,
    /// Slow-request warnings.
    SlowRequests,
    /// Error-response and very-slow-request audit log.
    SecurityAudit,
    Compression,
    RequestId,
    Logging,
    Liveness,
    Timeout,
    CatchPanic,
}
