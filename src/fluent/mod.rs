//! FluentRouter and middleware configuration.
//!
//! The functionality is split across submodules:
//!
//! - [`router`] - Core `FluentRouter` struct, tracking stores and initialization
//! - [`control`] - The security pipeline, guarded route groups, panic catching
//! - [`features`] - Timeouts, compression, CORS, Helmet, liveness probe
//! - [`observability`] - Request ids and request spans
//! - [`builder`] - Orchestration (setup_middleware, start, router delegation)

mod builder;
mod control;
mod features;
mod observability;
mod router;

pub use router::FluentRouter;

#[cfg(test)]
mod tests;
