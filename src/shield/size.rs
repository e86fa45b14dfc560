use super::{Filter, RequestContext, Verdict};
use crate::Error;
use http::header::CONTENT_LENGTH;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Renders a byte ceiling the way rejection bodies report it: `10MB`, `512KB`
/// or `100 bytes`.
pub(crate) fn human_size(bytes: u64) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Refuses requests whose declared `Content-Length` exceeds the ceiling,
/// before any body is read.
///
/// Bodies without a declared length are bounded later, while buffering.
#[derive(Debug, Clone)]
pub struct PayloadSizeGuard {
    max_bytes: u64,
    max_size: String,
}

impl PayloadSizeGuard {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            max_size: human_size(max_bytes),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl Filter for PayloadSizeGuard {
    fn name(&self) -> &'static str {
        "payload-size"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict {
        let Some(declared) = ctx.headers().get(CONTENT_LENGTH) else {
            return Verdict::Continue;
        };
        let Some(length) = declared
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        else {
            return Verdict::Terminate(Error::invalid_input("Invalid Content-Length header"));
        };

        if length <= self.max_bytes {
            return Verdict::Continue;
        }

        tracing::warn!(
            identity = %ctx.identity(),
            method = %ctx.method(),
            path = %ctx.path(),
            content_length = length,
            max_bytes = self.max_bytes,
            "Request entity too large"
        );
        Verdict::Terminate(
            Error::payload_too_large("Request entity too large").with_max_size(&self.max_size),
        )
    }
}
