use super::{IpAllowList, Pipeline, RateLimiter, WindowStore};
use crate::SecurityConfig;
use std::time::Instant;

/// The tracking stores of one server, created at startup and shared by the
/// filters that use them.
#[derive(Debug, Clone, Default)]
pub struct GuardStores {
    pub general: WindowStore,
    pub auth: WindowStore,
    pub admin: WindowStore,
    pub upload: WindowStore,
    pub errors: WindowStore,
}

impl GuardStores {
    /// Stores that each track at most `max_identities` clients.
    pub fn bounded(max_identities: usize) -> Self {
        Self {
            general: WindowStore::bounded(max_identities),
            auth: WindowStore::bounded(max_identities),
            admin: WindowStore::bounded(max_identities),
            upload: WindowStore::bounded(max_identities),
            errors: WindowStore::bounded(max_identities),
        }
    }

    /// Drops identities without in-window activity from every store.
    pub fn sweep(&self, security: &SecurityConfig, now: Instant) -> usize {
        let limits = &security.rate_limits;
        self.general.sweep(limits.general.window, now)
            + self.auth.sweep(limits.auth.window, now)
            + self.admin.sweep(limits.admin.window, now)
            + self.upload.sweep(limits.upload.window, now)
            + self.errors.sweep(security.error_rate.window, now)
    }

    /// Total identities across all stores.
    pub fn tracked_identities(&self) -> usize {
        self.general.len()
            + self.auth.len()
            + self.admin.len()
            + self.upload.len()
            + self.errors.len()
    }
}

/// Route groups with a dedicated budget on top of the general limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGuard {
    /// Login, registration and password flows.
    Auth,
    /// Administrative routes; also subject to the admin IP allow-list.
    Admin,
    /// File uploads.
    Upload,
}

impl RouteGuard {
    pub fn name(self) -> &'static str {
        match self {
            RouteGuard::Auth => "auth",
            RouteGuard::Admin => "admin",
            RouteGuard::Upload => "upload",
        }
    }

    /// Builds the filters enforced on the guarded group.
    pub fn pipeline(self, security: &SecurityConfig, stores: &GuardStores) -> Pipeline {
        let limits = &security.rate_limits;
        match self {
            RouteGuard::Auth => Pipeline::new().with(RateLimiter::new(
                self.name(),
                limits.auth.clone(),
                stores.auth.clone(),
            )),
            RouteGuard::Admin => Pipeline::new()
                .with_if(
                    !security.admin_ip_allowlist.is_empty(),
                    IpAllowList::new(security.admin_ip_allowlist.iter().copied()),
                )
                .with(RateLimiter::new(
                    self.name(),
                    limits.admin.clone(),
                    stores.admin.clone(),
                )),
            RouteGuard::Upload => Pipeline::new().with(RateLimiter::new(
                self.name(),
                limits.upload.clone(),
                stores.upload.clone(),
            )),
        }
    }
}
