use {
    crate::{Error, Result},
    http::{HeaderName, HeaderValue, Method},
    serde::Deserialize,
    std::{str::FromStr, time::Duration},
};

/// Configuration for Cross-Origin Resource Sharing (CORS).
///
/// The allow-list is exact: an `Origin` header must match one entry byte for
/// byte. Requests without an `Origin` header (curl, server-to-server, mobile
/// apps) are always allowed through. Any other origin is rejected with `403`.
///
/// # Examples
///
/// In TOML configuration:
/// ```toml
/// [http.cors]
/// allow_credentials = true
/// allowed_origins = ["https://hub.example.edu", "http://localhost:3000"]
/// allowed_methods = ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
/// allowed_headers = ["content-type", "authorization", "x-requested-with"]
/// max_age = "1h"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct HttpCorsConfig {
    /// Whether browsers may send cookies and authorization headers.
    /// By default `allow_credentials` is true.
    #[serde(default = "HttpCorsConfig::default_allow_credentials")]
    pub allow_credentials: bool,

    /// Exact origins allowed to make cross-origin requests.
    /// By default only `http://localhost:3000` (the frontend dev server).
    #[serde(default = "HttpCorsConfig::default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Methods announced in preflight responses.
    /// By default GET, POST, PUT, DELETE, PATCH and OPTIONS.
    #[serde(default = "HttpCorsConfig::default_allowed_methods")]
    pub allowed_methods: Vec<CorsMethod>,

    /// Request headers announced in preflight responses.
    /// By default Content-Type, Authorization and X-Requested-With.
    #[serde(default = "HttpCorsConfig::default_allowed_headers")]
    pub allowed_headers: Vec<CorsHeader>,

    /// Response headers readable by browser JavaScript.
    #[serde(default)]
    pub exposed_headers: Vec<CorsHeader>,

    /// How long browsers may cache a preflight response.
    #[serde(default, with = "humantime_serde")]
    pub max_age: Option<Duration>,
}

impl HttpCorsConfig {
    fn default_allow_credentials() -> bool {
        true
    }

    fn default_allowed_origins() -> Vec<String> {
        vec!["http://localhost:3000".into()]
    }

    fn default_allowed_methods() -> Vec<CorsMethod> {
        [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ]
        .into_iter()
        .map(CorsMethod)
        .collect()
    }

    fn default_allowed_headers() -> Vec<CorsHeader> {
        vec![
            CorsHeader(http::header::CONTENT_TYPE),
            CorsHeader(http::header::AUTHORIZATION),
            CorsHeader(HeaderName::from_static("x-requested-with")),
        ]
    }

    /// Sets whether credentials are allowed.
    pub fn with_allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Replaces the origin allow-list.
    ///
    /// ```rust
    /// use campus_shield::HttpCorsConfig;
    ///
    /// let cors = HttpCorsConfig::default()
    ///     .with_allowed_origins(vec!["https://hub.example.edu".into()]);
    /// assert!(cors.allows_origin("https://hub.example.edu"));
    /// assert!(!cors.allows_origin("https://hub.example.edu.evil.test"));
    /// ```
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Replaces the methods announced in preflight responses.
    pub fn with_allowed_methods(mut self, methods: Vec<CorsMethod>) -> Self {
        self.allowed_methods = methods;
        self
    }

    /// Replaces the request headers announced in preflight responses.
    pub fn with_allowed_headers(mut self, headers: Vec<CorsHeader>) -> Self {
        self.allowed_headers = headers;
        self
    }

    /// Sets the headers exposed to browser JavaScript.
    pub fn with_exposed_headers(mut self, headers: Vec<CorsHeader>) -> Self {
        self.exposed_headers = headers;
        self
    }

    /// Sets the preflight cache duration.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Exact, case-sensitive membership test.
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    pub fn validate(&self) -> Result<()> {
        if self.allow_credentials && self.allowed_origins.is_empty() {
            return Err(Error::config(
                "[http.cors] allowed_origins must not be empty when allow_credentials = true",
            ));
        }
        for origin in &self.allowed_origins {
            if origin == "*" {
                return Err(Error::config(
                    "[http.cors] wildcard origins are not supported, list each origin explicitly",
                ));
            }
            HeaderValue::from_str(origin).map_err(|_| {
                Error::config(format!("[http.cors] invalid origin {origin:?}"))
            })?;
        }
        Ok(())
    }
}

impl Default for HttpCorsConfig {
    fn default() -> Self {
        HttpCorsConfig {
            allow_credentials: Self::default_allow_credentials(),
            allowed_origins: Self::default_allowed_origins(),
            allowed_methods: Self::default_allowed_methods(),
            allowed_headers: Self::default_allowed_headers(),
            exposed_headers: Vec::new(),
            max_age: None,
        }
    }
}

/// Wrapper type for HTTP methods in CORS configuration.
///
/// ```toml
/// allowed_methods = ["GET", "POST", "PUT"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsMethod(pub Method);

impl<'de> Deserialize<'de> for CorsMethod {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let method = Method::from_str(&s).map_err(serde::de::Error::custom)?;
        Ok(CorsMethod(method))
    }
}

/// Wrapper type for HTTP header names in CORS configuration.
///
/// ```toml
/// allowed_headers = ["content-type", "authorization"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsHeader(pub HeaderName);

impl<'de> Deserialize<'de> for CorsHeader {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let header = HeaderName::from_str(&s).map_err(serde::de::Error::custom)?;
        Ok(CorsHeader(header))
    }
}
