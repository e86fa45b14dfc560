//! Detection of script-injection markers in request data.
//!
//! Detection only: findings are logged and the request continues unchanged.

use super::{Filter, RequestContext, Stage, Verdict};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Longest value excerpt written to the log.
pub const PREVIEW_CHARS: usize = 100;

/// Checked in order; the first match wins for a given string.
static SUSPICIOUS_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("script-tag", r"(?i)<\s*script\b"),
        ("javascript-uri", r"(?i)javascript\s*:"),
        ("inline-handler", r"(?i)\bon[a-z]+\s*="),
        ("iframe-tag", r"(?i)<\s*iframe\b"),
        ("object-tag", r"(?i)<\s*object\b"),
        ("embed-tag", r"(?i)<\s*embed\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        let regex = Regex::new(pattern).expect("suspicious content patterns are valid regexes");
        (name, regex)
    })
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Dotted location, e.g. `body.profile.bio` or `query.tags.1`.
    pub path: String,
    /// Name of the first matching pattern.
    pub pattern: &'static str,
    /// At most [`PREVIEW_CHARS`] characters of the offending value.
    pub preview: String,
}

/// Walks `value` and reports every string matching a suspicious pattern.
///
/// ```
/// use campus_shield::scan;
/// use serde_json::json;
///
/// let findings = scan(&json!({"bio": "<script>alert(1)</script>"}), "body");
/// assert_eq!(findings[0].path, "body.bio");
/// assert_eq!(findings[0].pattern, "script-tag");
/// ```
pub fn scan(value: &Value, path: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    scan_into(value, path, &mut findings);
    findings
}

fn scan_into(value: &Value, path: &str, findings: &mut Vec<Finding>) {
    match value {
        Value::String(text) => {
            if let Some((name, _)) = SUSPICIOUS_PATTERNS
                .iter()
                .find(|(_, regex)| regex.is_match(text))
            {
                findings.push(Finding {
                    path: path.to_owned(),
                    pattern: *name,
                    preview: text.chars().take(PREVIEW_CHARS).collect(),
                });
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                scan_into(value, &format!("{path}.{key}"), findings);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                scan_into(value, &format!("{path}.{index}"), findings);
            }
        }
        _ => {}
    }
}

/// Logs a warning for each suspicious value in the body or query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspiciousContentScanner;

impl SuspiciousContentScanner {
    fn report(ctx: &RequestContext, findings: Vec<Finding>) {
        for finding in findings {
            tracing::warn!(
                identity = %ctx.identity(),
                method = %ctx.method(),
                path = %ctx.path(),
                field = %finding.path,
                pattern = finding.pattern,
                preview = %finding.preview,
                "Suspicious content detected"
            );
        }
    }
}

impl Filter for SuspiciousContentScanner {
    fn name(&self) -> &'static str {
        "content-scan"
    }

    fn stage(&self) -> Stage {
        Stage::Payload
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict {
        if let Some(payload) = ctx.payload() {
            Self::report(ctx, scan(payload, "body"));
        }
        Self::report(ctx, scan(ctx.query(), "query"));
        Verdict::Continue
    }
}
