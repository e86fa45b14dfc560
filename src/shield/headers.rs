use super::{Filter, RequestContext, Verdict};
use axum::response::Response;
use http::{
    HeaderValue,
    header::{CONTENT_SECURITY_POLICY as CSP_HEADER, STRICT_TRANSPORT_SECURITY as HSTS_HEADER},
};

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
    font-src 'self' https://fonts.gstatic.com; \
    img-src 'self' data: https:; \
    script-src 'self'; \
    connect-src 'self'; \
    frame-src 'none'; \
    object-src 'none'";

/// One year, subdomains included, eligible for preload lists.
pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31536000; includeSubDomains; preload";

/// Stamps the content security policy and HSTS on every response, including
/// rejections from later filters. Place it first in the pipeline.
#[derive(Debug, Clone)]
pub struct SecurityHeadersPolicy {
    content_security_policy: HeaderValue,
    strict_transport_security: HeaderValue,
}

impl Default for SecurityHeadersPolicy {
    fn default() -> Self {
        Self {
            content_security_policy: HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            strict_transport_security: HeaderValue::from_static(STRICT_TRANSPORT_SECURITY),
        }
    }
}

impl Filter for SecurityHeadersPolicy {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    fn on_request(&self, _ctx: &mut RequestContext) -> Verdict {
        Verdict::Continue
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(CSP_HEADER, self.content_security_policy.clone());
        headers.insert(HSTS_HEADER, self.strict_transport_security.clone());
    }
}
