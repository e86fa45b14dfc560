//!
//! Small helpers shared by the configuration layer and the router builder.
//!
//! - [`RequestIdGenerator`] - Generates or preserves request IDs for log correlation
//! - [`replace_handlebars_with_env`] - Substitutes `{{ VAR }}` placeholders in config text
//!

use {
    http::{HeaderValue, Request},
    regex::{Captures, Regex},
    std::{env, sync::LazyLock},
    tower_http::request_id::{MakeRequestId, RequestId},
    uuid::{ContextV7, Timestamp, Uuid},
};

/// Matches `{{ VAR_NAME }}` with optional whitespace around an upper-case variable name.
static HANDLEBAR_REGEXP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").expect("handlebar pattern is a valid regex")
});

/// Request ID generator used by `SetRequestIdLayer`.
///
/// An incoming `x-request-id` header is kept as-is so that ids issued by the
/// student-hub frontend or a reverse proxy survive. Otherwise a fresh UUIDv7
/// is generated, which keeps ids sortable by arrival time in the security logs.
///
/// ```
/// use campus_shield::RequestIdGenerator;
/// use tower_http::request_id::SetRequestIdLayer;
///
/// let layer = SetRequestIdLayer::x_request_id(RequestIdGenerator);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, req: &Request<B>) -> Option<RequestId> {
        if let Some(value) = req.headers().get("x-request-id") {
            return Some(RequestId::new(value.clone()));
        }
        let cx = ContextV7::new().with_additional_precision();
        let uuid = Uuid::new_v7(Timestamp::now(cx));
        HeaderValue::from_str(&uuid.to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Replaces `{{ VAR_NAME }}` placeholders with environment variable values.
///
/// Missing variables become empty strings and are reported with a warning,
/// so that a typo in `config/prod.toml` shows up in the startup logs rather
/// than silently producing an empty origin allow-list.
///
/// ```
/// use campus_shield::replace_handlebars_with_env;
///
/// let result = replace_handlebars_with_env("origin = \"{{ CAMPUS_SHIELD_UNSET_VAR }}\"");
/// assert_eq!(result, "origin = \"\"");
/// ```
pub fn replace_handlebars_with_env(input: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(input, |caps: &Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!(
                    variable = %var_name,
                    "Environment variable not found, substituting with empty string"
                );
                String::new()
            })
        })
        .to_string()
}
