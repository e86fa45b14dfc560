use super::{Filter, RequestContext, Verdict};
use crate::{Error, HttpCorsConfig};
use axum::response::Response;
use http::{
    HeaderValue,
    header::{ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY},
};
use std::collections::HashSet;

/// Exact-match origin allow-list.
///
/// Requests without an `Origin` header pass. Listed origins pass and get the
/// origin echoed back (with credentials when enabled), including on
/// rejections produced further down the chain. Any other origin is refused
/// with `403`.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
    allow_credentials: bool,
}

impl OriginPolicy {
    pub fn new<I, S>(origins: I, allow_credentials: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: origins.into_iter().map(Into::into).collect(),
            allow_credentials,
        }
    }

    pub fn from_config(cors: &HttpCorsConfig) -> Self {
        Self::new(cors.allowed_origins.iter().cloned(), cors.allow_credentials)
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed.contains(origin)
    }
}

impl Filter for OriginPolicy {
    fn name(&self) -> &'static str {
        "origin-policy"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict {
        let Some(origin) = ctx.headers().get(ORIGIN) else {
            return Verdict::Continue;
        };
        if origin.to_str().is_ok_and(|origin| self.allows(origin)) {
            return Verdict::Continue;
        }

        tracing::warn!(
            origin = ?origin,
            identity = %ctx.identity(),
            method = %ctx.method(),
            path = %ctx.path(),
            "CORS origin denied"
        );
        Verdict::Terminate(Error::origin_denied("Not allowed by CORS"))
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(origin) = ctx.headers().get(ORIGIN) else {
            return;
        };
        let headers = response.headers_mut();
        if !headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
        if self.allow_credentials && !headers.contains_key(ACCESS_CONTROL_ALLOW_CREDENTIALS) {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        let varies_on_origin = headers
            .get_all(VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split(',').any(|part| part.trim().eq_ignore_ascii_case("origin")));
        if !varies_on_origin {
            headers.append(VARY, HeaderValue::from_static("origin"));
        }
    }
}
