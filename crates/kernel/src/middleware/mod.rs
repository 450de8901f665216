//! HTTP middleware components.
//!
//! Provides principal resolution and metrics collection.

pub mod metrics;
pub mod principal;

pub use metrics::track_requests;
pub use principal::{CurrentPrincipal, PrincipalDirectory, resolve_principal};
