use super::{Filter, RequestContext, Verdict};
use crate::Error;
use std::{collections::HashSet, net::IpAddr};

/// Restricts a route group to a fixed set of client addresses.
///
/// An empty list admits everyone. Identities that are not IP addresses
/// (for example `unknown`) are refused when the list is non-empty.
#[derive(Debug, Clone, Default)]
pub struct IpAllowList {
    allowed: HashSet<IpAddr>,
}

impl IpAllowList {
    pub fn new(allowed: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn allows(&self, identity: &str) -> bool {
        self.allowed.is_empty()
            || identity
                .parse::<IpAddr>()
                .is_ok_and(|ip| self.allowed.contains(&ip.to_canonical()))
    }
}

impl Filter for IpAllowList {
    fn name(&self) -> &'static str {
        "admin-ip-allowlist"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Verdict {
        if self.allows(ctx.identity()) {
            return Verdict::Continue;
        }

        tracing::warn!(
            identity = %ctx.identity(),
            method = %ctx.method(),
            path = %ctx.path(),
            "Admin access denied for address"
        );
        Verdict::Terminate(Error::forbidden("Access denied from this IP"))
    }
}
