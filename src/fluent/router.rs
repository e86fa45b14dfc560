//! Core FluentRouter struct and initialization methods.

use {
    crate::{Config, GuardStores, HttpMiddleware, Result},
    axum::Router,
    tokio_util::{sync::CancellationToken, task::AbortOnDropHandle},
};

/// Fluent builder for axum::Router with configuration-based security setup.
///
/// This wrapper around `axum::Router` installs the request security pipeline
/// and the surrounding infrastructure layers from the application
/// configuration. Create instances using [`FluentRouter::without_state`] or
/// [`FluentRouter::with_state`].
///
/// The router owns the tracking stores used by the rate limiters and the
/// error-rate circuit. They are created once here and shared by the main
/// pipeline and every guarded route group, so a client is counted in one
/// place no matter which group it hits.
///
/// # Graceful Shutdown
///
/// A cancellation token is triggered when the server receives SIGTERM or
/// SIGINT. Background tasks can watch it to stop their work:
///
/// ```rust,no_run
/// use campus_shield::{Config, FluentRouter};
///
/// # async fn example() -> campus_shield::Result<()> {
/// let router = FluentRouter::without_state(Config::default())?;
///
/// let token = router.cancellation_token();
/// tokio::spawn(async move {
///     loop {
///         tokio::select! {
///             _ = token.cancelled() => break,
///             _ = do_work() => {}
///         }
///     }
/// });
/// # async fn do_work() {}
/// # Ok(())
/// # }
/// ```
pub struct FluentRouter<State = ()> {
    pub(crate) config: Config,
    pub(crate) state: State,
    pub(crate) inner: Router<State>,
    pub(crate) stores: GuardStores,
    pub(crate) sweeper_handle: Option<AbortOnDropHandle<()>>,
    pub(crate) panic_channel: Option<tokio::sync::mpsc::Sender<String>>,
    pub(crate) shutdown_token: CancellationToken,
}

impl FluentRouter {
    /// Creates a new `FluentRouter` without application state.
    pub fn without_state(config: Config) -> Result<FluentRouter<()>> {
        FluentRouter::<()>::with_state(config, ())
    }
}

impl<State> FluentRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Creates a new `FluentRouter` with the provided configuration.
    ///
    /// Validates the configuration and creates the tracking stores, bounded by
    /// `security.max_tracked_clients`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_state<S: Clone + Send + Sync + 'static>(
        config: Config,
        state: S,
    ) -> Result<FluentRouter<S>> {
        config.validate()?;

        let stores = GuardStores::bounded(config.security.max_tracked_clients);

        Ok(FluentRouter {
            config,
            state,
            inner: Router::new(),
            stores,
            sweeper_handle: None,
            panic_channel: None,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Returns the configuration the router was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the tracking stores shared by the limiters and the error-rate
    /// circuit.
    ///
    /// Useful for inspection in tests or for an operator endpoint that
    /// reports how many clients are currently tracked.
    pub fn stores(&self) -> &GuardStores {
        &self.stores
    }

    /// Returns a cancellation token that is triggered when shutdown begins.
    ///
    /// Each call returns a new clone of the token. All clones share the same
    /// cancellation state. Cancelling it stops a running server as if a
    /// shutdown signal had been received.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Helper method to check if a middleware is enabled in the configuration.
    /// Returns true if no middleware config is specified (all enabled by default),
    /// or if the middleware is explicitly enabled/not excluded.
    pub(crate) fn is_middleware_enabled(&self, middleware: HttpMiddleware) -> bool {
        self.config
            .http
            .middleware
            .as_ref()
            .map(|config| config.is_enabled(middleware))
            .unwrap_or(true)
    }

    /// Sets a notification channel for panic messages.
    ///
    /// When configured, any panics caught by the panic handler middleware will
    /// send a message to this channel.
    ///
    /// ```rust,no_run
    /// # use campus_shield::{Config, FluentRouter};
    /// # async fn example() -> campus_shield::Result<()> {
    /// let (tx, mut rx) = tokio::sync::mpsc::channel(100);
    ///
    /// let router = FluentRouter::without_state(Config::default())?
    ///     .with_panic_notification_channel(tx);
    ///
    /// tokio::spawn(async move {
    ///     while let Some(panic_msg) = rx.recv().await {
    ///         eprintln!("Panic caught: {}", panic_msg);
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn with_panic_notification_channel(self, ch: tokio::sync::mpsc::Sender<String>) -> Self {
        Self {
            panic_channel: Some(ch),
            ..self
        }
    }
}
