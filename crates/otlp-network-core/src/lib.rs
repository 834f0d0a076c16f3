//! otlp-network-core — network metrics collection for the otlp-network daemon.
//!
//! Provides:
//! - `collector` — `/proc` parsers, per-CPU aggregation and the network collectors
//! - `telemetry` — instrument registry, collection passes, Prometheus exposition,
//!   OTLP/HTTP export and the pull/push readers
//! - `error` — setup and per-collector error types

pub mod collector;
pub mod error;
pub mod telemetry;

pub use error::{CollectError, SetupError};

/// Crate version, reported as `service.version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git SHA of the build, `unknown` outside a checkout.
pub const GIT_SHA: &str = env!("GIT_SHA");

/// `VERSION (GIT_SHA)`, shown by `--version`.
pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_SHA"), ")");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_version_carries_sha() {
        assert_eq!(LONG_VERSION, format!("{VERSION} ({GIT_SHA})"));
    }
}
