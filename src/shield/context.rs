//! Per-request state threaded through the filter chain.

use super::query;
use crate::{Error, Result};
use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
};
use http::{
    Extensions, HeaderMap, HeaderValue, Method, Request, Uri,
    header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING},
    request::Parts,
    uri::PathAndQuery,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;
use std::{net::SocketAddr, time::Instant};

/// Identity used when neither a trusted proxy header nor a peer address is available.
pub const UNKNOWN_IDENTITY: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Json,
    Form,
}

impl PayloadKind {
    fn detect(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            Some(PayloadKind::Json)
        } else if mime == "application/x-www-form-urlencoded" {
            Some(PayloadKind::Form)
        } else {
            None
        }
    }
}

enum BodySlot {
    Unread(Body),
    Read {
        bytes: Bytes,
        kind: PayloadKind,
        value: Option<Value>,
        dirty: bool,
    },
    Taken,
}

/// The request as seen by filters: head, client identity, decoded query and,
/// once a payload-stage filter runs, the decoded body.
///
/// Filters may replace the query or body; the rewritten values are what the
/// application receives.
pub struct RequestContext {
    parts: Parts,
    identity: String,
    query: Value,
    query_dirty: bool,
    body: BodySlot,
    body_limit: usize,
    started_at: Instant,
}

impl RequestContext {
    /// Splits `request` and resolves the client identity.
    ///
    /// With `trust_proxy` the first `X-Forwarded-For` hop wins; otherwise the
    /// peer address from `ConnectInfo` is used.
    pub fn new(request: Request<Body>, trust_proxy: bool, body_limit: usize) -> Self {
        let (parts, body) = request.into_parts();
        let identity = client_identity(&parts.headers, &parts.extensions, trust_proxy);
        let query = query::decode(parts.uri.query().unwrap_or_default());
        Self {
            parts,
            identity,
            query,
            query_dirty: false,
            body: BodySlot::Unread(body),
            body_limit,
            started_at: Instant::now(),
        }
    }

    /// Overrides the entry timestamp.
    #[must_use]
    pub fn with_started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header value as text, if present and visible ASCII.
    pub fn header_str(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Decoded query parameters, always an object.
    pub fn query(&self) -> &Value {
        &self.query
    }

    /// Replaces the decoded query with a pruned copy of itself.
    ///
    /// The forwarded query keeps the original pairs whose key path is still
    /// present in `query`, so repeated keys and their encoding are untouched.
    pub fn replace_query(&mut self, query: Value) {
        self.query = query;
        self.query_dirty = true;
    }

    /// Decoded JSON or urlencoded body. `None` until the payload is loaded,
    /// for other content types, and for bodies that failed to decode.
    pub fn payload(&self) -> Option<&Value> {
        match &self.body {
            BodySlot::Read { value, .. } => value.as_ref(),
            _ => None,
        }
    }

    /// Replaces the decoded body. Ignored when no decoded body exists.
    pub fn replace_payload(&mut self, payload: Value) {
        if let BodySlot::Read { value, dirty, .. } = &mut self.body
            && value.is_some()
        {
            *value = Some(payload);
            *dirty = true;
        }
    }

    /// Buffers and decodes the body if it is JSON or urlencoded.
    ///
    /// Reading stops at the payload ceiling; a longer body fails with
    /// `PayloadTooLarge`. Calling this more than once is a no-op.
    pub async fn load_payload(&mut self) -> Result<()> {
        let kind = match (&self.body, PayloadKind::detect(&self.parts.headers)) {
            (BodySlot::Unread(_), Some(kind)) => kind,
            _ => return Ok(()),
        };
        let body = match std::mem::replace(&mut self.body, BodySlot::Taken) {
            BodySlot::Unread(body) => body,
            other => {
                self.body = other;
                return Ok(());
            }
        };

        let bytes = match Limited::new(body, self.body_limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(Error::payload_too_large("Request entity too large")
                    .with_max_size(super::size::human_size(self.body_limit as u64)));
            }
            Err(err) => {
                tracing::debug!(
                    identity = %self.identity,
                    path = %self.path(),
                    error = %err,
                    "Failed to read request body"
                );
                return Err(Error::invalid_input("Failed to read request body"));
            }
        };

        let value = match kind {
            PayloadKind::Json => serde_json::from_slice::<Value>(&bytes).ok(),
            PayloadKind::Form => std::str::from_utf8(&bytes).ok().map(query::decode),
        };
        if value.is_none() && !bytes.is_empty() {
            tracing::debug!(
                identity = %self.identity,
                path = %self.path(),
                "Request body could not be decoded, forwarding as-is"
            );
        }

        self.body = BodySlot::Read {
            bytes,
            kind,
            value,
            dirty: false,
        };
        Ok(())
    }

    /// Reassembles the request for the inner service, re-encoding the query
    /// and body when a filter replaced them.
    ///
    /// The context keeps a copy of the request head so response hooks can
    /// still read method, path and headers.
    pub fn take_request(&mut self) -> Request<Body> {
        let mut parts = self.detach_parts();

        if self.query_dirty
            && let Some(uri) = rewrite_query(&parts.uri, &self.query)
        {
            parts.uri = uri;
        }

        let body = match std::mem::replace(&mut self.body, BodySlot::Taken) {
            BodySlot::Unread(body) => body,
            BodySlot::Read {
                bytes,
                kind,
                value,
                dirty,
            } => {
                let bytes = match (dirty, value) {
                    (true, Some(value)) => encode_payload(kind, &value, &bytes).unwrap_or(bytes),
                    _ => bytes,
                };
                parts.headers.remove(TRANSFER_ENCODING);
                parts
                    .headers
                    .insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                Body::from(bytes)
            }
            BodySlot::Taken => Body::empty(),
        };

        Request::from_parts(parts, body)
    }

    fn detach_parts(&mut self) -> Parts {
        let (mut retained, _) = Request::new(()).into_parts();
        retained.method = self.parts.method.clone();
        retained.uri = self.parts.uri.clone();
        retained.version = self.parts.version;
        retained.headers = self.parts.headers.clone();
        std::mem::replace(&mut self.parts, retained)
    }
}

/// Resolves the client identity from request headers and extensions.
///
/// With `trust_proxy` the first `X-Forwarded-For` hop wins. Otherwise the
/// canonical peer IP from `ConnectInfo<SocketAddr>` is used, or
/// [`UNKNOWN_IDENTITY`] when the server was not started with connect info.
pub fn client_identity(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> String {
    if trust_proxy
        && let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
    {
        return forwarded.to_owned();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_owned())
}

fn rewrite_query(uri: &Uri, query: &Value) -> Option<Uri> {
    let encoded = query::retain_present(uri.query().unwrap_or_default(), query);
    let path_and_query = if encoded.is_empty() {
        uri.path().to_owned()
    } else {
        format!("{}?{}", uri.path(), encoded)
    };

    let mut uri_parts = uri.clone().into_parts();
    uri_parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    match Uri::from_parts(uri_parts) {
        Ok(uri) => Some(uri),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to rebuild sanitized request URI");
            None
        }
    }
}

fn encode_payload(kind: PayloadKind, value: &Value, original: &Bytes) -> Option<Bytes> {
    match kind {
        PayloadKind::Json => serde_json::to_vec(value).ok().map(Bytes::from),
        PayloadKind::Form => std::str::from_utf8(original)
            .ok()
            .map(|raw| Bytes::from(query::retain_present(raw, value))),
    }
}
