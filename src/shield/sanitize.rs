//! Removal of operator-injection keys from request data.

use super::{Filter, RequestContext, Stage, Verdict};
use serde_json::{Map, Value};

/// Keys starting with `$` (query operators) or `__` (prototype tricks) are
/// never passed on to the application.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with('$') || key.starts_with("__")
}

/// Returns a copy of `value` with reserved keys removed at every depth.
///
/// Non-mapping values are returned unchanged; arrays are kept and their
/// elements sanitized.
///
/// ```
/// use campus_shield::sanitize;
/// use serde_json::json;
///
/// let clean = sanitize(&json!({"user": {"$ne": null, "name": "ada"}, "__proto__": {}}));
/// assert_eq!(clean, json!({"user": {"name": "ada"}}));
/// ```
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_reserved_key(key))
                .map(|(key, value)| (key.clone(), sanitize(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

/// Whether any mapping inside `value` carries a reserved key.
pub fn contains_reserved(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| is_reserved_key(key) || contains_reserved(value)),
        Value::Array(items) => items.iter().any(contains_reserved),
        _ => false,
    }
}

/// Strips reserved keys from the decoded body and query string.
///
/// Dropped keys are not reported to the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer;

impl Filter for Sanitizer {
    fn name(&self) -> &'static str {
        "sanitizer"
    }

    fn stage(&self) -> Stage {
        Stage::Payload
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict {
        if let Some(payload) = ctx.payload()
            && contains_reserved(payload)
        {
            let clean = sanitize(payload);
            tracing::debug!(
                identity = %ctx.identity(),
                path = %ctx.path(),
                "Removed reserved keys from body"
            );
            ctx.replace_payload(clean);
        }

        if contains_reserved(ctx.query()) {
            let clean = sanitize(ctx.query());
            tracing::debug!(
                identity = %ctx.identity(),
                path = %ctx.path(),
                "Removed reserved keys from query"
            );
            ctx.replace_query(clean);
        }

        Verdict::Continue
    }
}
