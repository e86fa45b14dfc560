mod cors;
mod middleware;

pub use cors::*;
pub use middleware::*;

use {
    crate::{Error, Result},
    serde::Deserialize,
    std::{fmt, time::Duration},
};

/// X-Frame-Options header value configuration.
///
/// When the `security-headers` feature is enabled, it is converted to the
/// `axum_helmet::XFrameOptions` value installed by `setup_helmet`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum XFrameOptions {
    /// Prevents the page from being displayed in a frame
    #[default]
    Deny,
    /// Allows the page to be displayed in a frame on the same origin
    SameOrigin,
    /// Allows the page to be displayed in a frame on the specified origin
    #[serde(rename = "ALLOW-FROM")]
    AllowFrom(String),
}

impl fmt::Display for XFrameOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XFrameOptions::Deny => write!(f, "DENY"),
            XFrameOptions::SameOrigin => write!(f, "SAMEORIGIN"),
            XFrameOptions::AllowFrom(url) => write!(f, "ALLOW-FROM {}", url),
        }
    }
}

///
/// Configuration for the HTTP server
///
/// Binding, body ceiling, timeouts, the liveness route and the response
/// header/compression settings that surround the security pipeline.
///
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// IP address to bind the HTTP server to
    /// The default `bind_addr` is "127.0.0.1".
    #[serde(default = "HttpConfig::default_bind_addr")]
    pub bind_addr: String,

    /// Port to bind the HTTP server to
    /// The default `bind_port` is 5000.
    #[serde(default = "HttpConfig::default_bind_port")]
    pub bind_port: u16,

    /// Maximum allowed time for a request to complete before timing out
    /// with a 408 Request Timeout response. By default `request_timeout` is None.
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Maximum payload size for incoming HTTP requests.
    /// A declared `Content-Length` above this value is rejected with 413
    /// before the body is read; bodies without a declared length are cut off
    /// at the same ceiling while buffering.
    /// By default `max_payload_size_bytes` is 10MiB.
    #[serde(default = "HttpConfig::default_max_payload_size_bytes")]
    pub max_payload_size_bytes: byte_unit::Byte,

    /// Whether or not to compress responses (gzip/brotli/deflate/zstd).
    /// Clients can opt out per request with an `X-No-Compression` header.
    /// By default compression is enabled.
    #[serde(default = "HttpConfig::default_support_compression")]
    pub support_compression: bool,

    /// Route for liveness checks.
    /// By default `liveness_route` is "/api/health".
    #[serde(default = "HttpConfig::default_liveness_route")]
    pub liveness_route: String,

    /// Whether to set the X-Content-Type-Options header to "nosniff".
    /// By default `x_content_type_nosniff` is set to true.
    #[serde(default = "HttpConfig::default_x_content_type_nosniff")]
    pub x_content_type_nosniff: bool,

    /// Whether to set the X-Frame-Options header to "DENY", "SAMEORIGIN" or a URI.
    /// By default `x_frame_options` is set to "DENY".
    #[serde(default = "HttpConfig::default_x_frame_options")]
    pub x_frame_options: HttpXFrameConfig,

    /// Origin allow-list and preflight settings.
    #[serde(default)]
    pub cors: HttpCorsConfig,

    /// Maximum time to wait for graceful shutdown to complete.
    /// After this timeout, the server will force shutdown.
    /// By default `shutdown_timeout` is set to 30 seconds.
    #[serde(
        default = "HttpConfig::default_shutdown_timeout",
        with = "humantime_serde"
    )]
    pub shutdown_timeout: Duration,

    #[serde(default)]
    pub middleware: Option<HttpMiddlewareConfig>,
}

impl HttpConfig {
    ///
    /// Returns the full bind address as a string in the format "IP:PORT".
    ///
    pub fn full_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    fn default_bind_addr() -> String {
        "127.0.0.1".into()
    }

    fn default_bind_port() -> u16 {
        5000
    }

    fn default_max_payload_size_bytes() -> byte_unit::Byte {
        byte_unit::Byte::from_u64(10 * 1024 * 1024)
    }

    fn default_support_compression() -> bool {
        true
    }

    fn default_liveness_route() -> String {
        "/api/health".into()
    }

    fn default_x_content_type_nosniff() -> bool {
        true
    }

    fn default_x_frame_options() -> HttpXFrameConfig {
        HttpXFrameConfig(XFrameOptions::Deny)
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(Error::invalid_input(
                "HTTP bind_addr is required. Set [http] bind_addr = \"0.0.0.0\" or \"127.0.0.1\" in config.",
            ));
        }

        if self.bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(Error::invalid_input(
                "HTTP bind_addr must be a valid IP address. Examples: \"127.0.0.1\", \"0.0.0.0\", \"::1\"",
            ));
        }

        if self.max_payload_size_bytes.as_u64() == 0 {
            return Err(Error::invalid_input(
                "HTTP max_payload_size_bytes must be > 0. Set [http] max_payload_size_bytes = \"10MiB\" in config.",
            ));
        }

        if !self.liveness_route.starts_with('/') {
            return Err(Error::invalid_input(
                "HTTP liveness_route must start with '/'",
            ));
        }

        self.cors.validate()?;

        if let Some(middleware_config) = &self.middleware {
            middleware_config.validate()?;
        }

        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            bind_addr: Self::default_bind_addr(),
            bind_port: Self::default_bind_port(),
            request_timeout: None,
            max_payload_size_bytes: Self::default_max_payload_size_bytes(),
            support_compression: Self::default_support_compression(),
            liveness_route: Self::default_liveness_route(),
            x_content_type_nosniff: Self::default_x_content_type_nosniff(),
            x_frame_options: Self::default_x_frame_options(),
            cors: HttpCorsConfig::default(),
            shutdown_timeout: Self::default_shutdown_timeout(),
            middleware: None,
        }
    }
}

/// Configuration wrapper for the X-Frame-Options security header.
///
/// - `"DENY"` or `"deny"` - Prevents the page from being displayed in a frame
/// - `"SAMEORIGIN"` or `"sameorigin"` - Allows framing only from the same origin
/// - Any other string - Treated as `AllowFrom(url)`
#[derive(Clone, PartialEq, Eq)]
pub struct HttpXFrameConfig(pub XFrameOptions);

impl HttpXFrameConfig {
    pub fn deny() -> Self {
        HttpXFrameConfig(XFrameOptions::Deny)
    }
    pub fn same_origin() -> Self {
        HttpXFrameConfig(XFrameOptions::SameOrigin)
    }
    pub fn allow_from(url: impl Into<String>) -> Self {
        HttpXFrameConfig(XFrameOptions::AllowFrom(url.into()))
    }
}

impl Default for HttpXFrameConfig {
    fn default() -> Self {
        Self::deny()
    }
}

impl std::fmt::Debug for HttpXFrameConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for HttpXFrameConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let x_frame_options = match s.to_uppercase().as_str() {
            "DENY" => XFrameOptions::Deny,
            "SAMEORIGIN" => XFrameOptions::SameOrigin,
            _ => XFrameOptions::AllowFrom(s),
        };
        Ok(HttpXFrameConfig(x_frame_options))
    }
}
