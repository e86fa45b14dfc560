use {
    crate::{Error, Result},
    serde::Deserialize,
    std::{net::IpAddr, time::Duration},
};

///
/// Configuration for the request security pipeline.
///
/// Every field has a default matching the student-hub deployment, so an empty
/// `[security]` table (or no table at all) yields a working configuration.
///
/// ```toml
/// [security]
/// trust_proxy = true
/// admin_ip_allowlist = ["10.0.0.5"]
/// sweep_interval = "60s"
/// max_tracked_clients = 100000
///
/// [security.rate_limits.auth]
/// window = "15m"
/// max_requests = 50
///
/// [security.error_rate]
/// window = "15m"
/// max_errors = 10
/// ```
///
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Use the first `X-Forwarded-For` hop as the client identity.
    /// Only enable this behind a reverse proxy that overwrites the header.
    /// By default `trust_proxy` is false and the socket peer address is used.
    #[serde(default)]
    pub trust_proxy: bool,

    /// Addresses allowed to reach routes guarded with `RouteGuard::Admin`.
    /// An empty list allows every address.
    #[serde(default)]
    pub admin_ip_allowlist: Vec<IpAddr>,

    /// How often idle identities are pruned from the tracking stores.
    #[serde(
        default = "SecurityConfig::default_sweep_interval",
        with = "humantime_serde"
    )]
    pub sweep_interval: Duration,

    /// Upper bound on identities held by each tracking store. Inserting a new
    /// identity beyond this bound evicts the one with the stalest activity.
    #[serde(default = "SecurityConfig::default_max_tracked_clients")]
    pub max_tracked_clients: usize,

    #[serde(default)]
    pub rate_limits: RateLimitsConfig,

    #[serde(default)]
    pub error_rate: ErrorRateConfig,

    #[serde(default)]
    pub slow_requests: SlowRequestConfig,
}

impl SecurityConfig {
    fn default_sweep_interval() -> Duration {
        Duration::from_secs(60)
    }

    fn default_max_tracked_clients() -> usize {
        100_000
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(Error::config(
                "[security] sweep_interval must be greater than zero, e.g. \"60s\"",
            ));
        }
        if self.max_tracked_clients == 0 {
            return Err(Error::config(
                "[security] max_tracked_clients must be greater than zero",
            ));
        }
        self.rate_limits.general.validate("general")?;
        self.rate_limits.auth.validate("auth")?;
        self.rate_limits.admin.validate("admin")?;
        self.rate_limits.upload.validate("upload")?;
        self.error_rate.validate()?;
        Ok(())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            trust_proxy: false,
            admin_ip_allowlist: Vec::new(),
            sweep_interval: Self::default_sweep_interval(),
            max_tracked_clients: Self::default_max_tracked_clients(),
            rate_limits: RateLimitsConfig::default(),
            error_rate: ErrorRateConfig::default(),
            slow_requests: SlowRequestConfig::default(),
        }
    }
}

/// A sliding-window request budget: at most `max_requests` per `window`.
///
/// When a table is given in TOML, `window` and `max_requests` are required and
/// `message` falls back to a generic rejection text.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RateLimitRule {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub max_requests: u32,
    #[serde(default)]
    pub message: Option<String>,
}

impl RateLimitRule {
    pub const FALLBACK_MESSAGE: &'static str = "Too many requests, please try again later.";

    pub fn new(window: Duration, max_requests: u32) -> Self {
        RateLimitRule {
            window,
            max_requests,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The rejection message, or the generic fallback.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(Self::FALLBACK_MESSAGE)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.window < Duration::from_secs(1) {
            return Err(Error::config(format!(
                "[security.rate_limits.{name}] window must be at least one second, e.g. \"15m\""
            )));
        }
        if self.max_requests == 0 {
            return Err(Error::config(format!(
                "[security.rate_limits.{name}] max_requests must be greater than zero"
            )));
        }
        Ok(())
    }
}

/// The four independent limiters of the student hub.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    /// Applied to every request. Default: 500 per 15 minutes.
    #[serde(default = "RateLimitsConfig::default_general")]
    pub general: RateLimitRule,

    /// Applied to `RouteGuard::Auth` routes. Default: 50 per 15 minutes.
    #[serde(default = "RateLimitsConfig::default_auth")]
    pub auth: RateLimitRule,

    /// Applied to `RouteGuard::Admin` routes. Default: 50 per 15 minutes.
    #[serde(default = "RateLimitsConfig::default_admin")]
    pub admin: RateLimitRule,

    /// Applied to `RouteGuard::Upload` routes. Default: 10 per hour.
    #[serde(default = "RateLimitsConfig::default_upload")]
    pub upload: RateLimitRule,
}

impl RateLimitsConfig {
    fn default_general() -> RateLimitRule {
        RateLimitRule::new(Duration::from_secs(15 * 60), 500)
            .with_message("Too many requests from this IP, please try again later.")
    }

    fn default_auth() -> RateLimitRule {
        RateLimitRule::new(Duration::from_secs(15 * 60), 50)
            .with_message("Too many authentication attempts, please try again later.")
    }

    fn default_admin() -> RateLimitRule {
        RateLimitRule::new(Duration::from_secs(15 * 60), 50)
            .with_message("Too many admin requests, please try again later.")
    }

    fn default_upload() -> RateLimitRule {
        RateLimitRule::new(Duration::from_secs(60 * 60), 10)
            .with_message("Too many file uploads, please try again later.")
    }
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        RateLimitsConfig {
            general: Self::default_general(),
            auth: Self::default_auth(),
            admin: Self::default_admin(),
            upload: Self::default_upload(),
        }
    }
}

/// Per-client throttling driven by error responses (status >= 400).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorRateConfig {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub max_errors: u32,
    pub message: String,
}

impl ErrorRateConfig {
    fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(Error::config(
                "[security.error_rate] window must be greater than zero",
            ));
        }
        if self.max_errors == 0 {
            return Err(Error::config(
                "[security.error_rate] max_errors must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for ErrorRateConfig {
    fn default() -> Self {
        ErrorRateConfig {
            window: Duration::from_secs(15 * 60),
            max_errors: 10,
            message: "Too many failed requests from this IP, please try again later.".into(),
        }
    }
}

/// Thresholds for the slow-request warnings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlowRequestConfig {
    /// General performance logger threshold. Default: 1s.
    #[serde(with = "humantime_serde")]
    pub threshold: Duration,

    /// Security audit logger threshold. Default: 5s.
    #[serde(with = "humantime_serde")]
    pub audit_threshold: Duration,
}

impl Default for SlowRequestConfig {
    fn default() -> Self {
        SlowRequestConfig {
            threshold: Duration::from_millis(1000),
            audit_threshold: Duration::from_millis(5000),
        }
    }
}
