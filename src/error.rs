//! Error types and rejection responses for the security pipeline.
//!
//! Every filter that short-circuits a request does so by returning an [`Error`].
//! Errors map to an HTTP status code and render as the public rejection body
//! used by the student-hub API:
//!
//! ```json
//! { "success": false, "message": "Too many requests", "retryAfter": 900 }
//! ```
//!
//! # Design
//!
//! This module uses an opaque `Error` struct paired with an `ErrorKind` enum,
//! following the `std::io::Error` pattern. Filters can attach retry guidance
//! (`retryAfter`) or the payload ceiling (`maxSize`) to the rejection without
//! the caller having to know which filter produced it.
//!
//! # Example
//!
//! ```rust
//! use campus_shield::{Error, ErrorKind};
//! use std::time::Duration;
//!
//! let error = Error::rate_limited("Too many requests")
//!     .with_retry_after(Duration::from_secs(900));
//!
//! assert_eq!(error.kind(), ErrorKind::RateLimited);
//! assert_eq!(error.status_code().as_u16(), 429);
//! ```

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{fmt, time::Duration};
use thiserror::Error;

/// The kind of error that occurred.
///
/// This enum categorizes errors for matching purposes. Use `Error::kind()`
/// to get the kind of an error.
///
/// # Stability
///
/// This enum is marked `#[non_exhaustive]`, so new variants may be added
/// in future versions without breaking existing code. Always include a
/// wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Configuration error (invalid TOML, missing values).
    #[error("configuration error")]
    Configuration,

    /// I/O error (file operations, network).
    #[error("I/O error")]
    Io,

    /// Invalid input (bad header, unreadable request data).
    #[error("invalid input")]
    InvalidInput,

    /// A rate limiter rejected the request.
    #[error("rate limited")]
    RateLimited,

    /// The client produced too many error responses recently.
    #[error("too many errors")]
    TooManyErrors,

    /// The declared or actual request body exceeds the payload ceiling.
    #[error("payload too large")]
    PayloadTooLarge,

    /// The request origin is not on the CORS allow-list.
    #[error("origin denied")]
    OriginDenied,

    /// The client is not permitted to reach the resource.
    #[error("forbidden")]
    Forbidden,

    /// Internal/unexpected error.
    #[error("internal error")]
    Internal,
}

/// An error that can occur in the security pipeline or while configuring it.
///
/// Use [`Error::kind()`] to determine the category of error for matching,
/// and the `Display` implementation to get a human-readable message.
///
/// # Creating Errors
///
/// ```rust
/// use campus_shield::Error;
///
/// let err = Error::config("missing allowed origins");
/// let err = Error::payload_too_large("Request entity too large").with_max_size("10MB");
/// let err = Error::origin_denied("Not allowed by CORS");
/// ```
pub struct Error {
    kind: ErrorKind,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
    retry_after: Option<Duration>,
    max_size: Option<String>,
}

impl Error {
    /// Creates a new error with the given kind and source.
    ///
    /// ```rust
    /// use campus_shield::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Internal, "something went wrong");
    /// assert_eq!(err.kind(), ErrorKind::Internal);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            source: error.into(),
            retry_after: None,
            max_size: None,
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns a stable identifier for the error, used in log lines.
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Configuration => "CONFIG_ERROR",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::TooManyErrors => "TOO_MANY_ERRORS",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::OriginDenied => "ORIGIN_DENIED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::TooManyErrors => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::OriginDenied => StatusCode::FORBIDDEN,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attaches retry guidance. Rendered as `retryAfter` (whole seconds) in the
    /// body and as a `Retry-After` header.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Attaches the human-readable payload ceiling, rendered as `maxSize`.
    pub fn with_max_size(mut self, max_size: impl Into<String>) -> Self {
        self.max_size = Some(max_size.into());
        self
    }

    /// Returns the retry guidance, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Converts the error into the public rejection body.
    pub fn to_error_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse::new(self.to_string());
        if let Some(retry_after) = self.retry_after {
            response = response.with_retry_after(whole_seconds(retry_after));
        }
        if let Some(max_size) = &self.max_size {
            response = response.with_max_size(max_size.clone());
        }
        response
    }

    /// Consumes the error and returns the inner error source.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.source
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, msg.into())
    }

    /// Creates an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg.into())
    }

    /// Creates a rate limit rejection.
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, msg.into())
    }

    /// Creates an error-rate circuit rejection.
    pub fn too_many_errors(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyErrors, msg.into())
    }

    /// Creates a payload size rejection.
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg.into())
    }

    /// Creates a CORS origin rejection.
    pub fn origin_denied(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::OriginDenied, msg.into())
    }

    /// Creates a forbidden error.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg.into())
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("retry_after", &self.retry_after)
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_error_response();

        if status.is_server_error() {
            tracing::error!(
                error_code = self.error_code(),
                message = %body.message,
                status = status.as_u16(),
                "Request failed"
            );
        } else {
            tracing::debug!(
                error_code = self.error_code(),
                message = %body.message,
                status = status.as_u16(),
                "Request rejected"
            );
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&whole_seconds(retry_after).to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

/// Rounds partial seconds up so retry guidance never reads `0`.
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

// ============================================================================
// From implementations
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

// ============================================================================
// ErrorResponse
// ============================================================================

/// Public rejection body: `{success:false, message, retryAfter?, maxSize?}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Always `false` for rejections.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Seconds the client should wait before retrying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Maximum accepted payload size, e.g. `"10MB"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<String>,
}

impl ErrorResponse {
    /// Creates a new rejection body.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            retry_after: None,
            max_size: None,
        }
    }

    /// Adds retry guidance in seconds.
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Adds the payload ceiling.
    pub fn with_max_size(mut self, max_size: impl Into<String>) -> Self {
        self.max_size = Some(max_size.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
