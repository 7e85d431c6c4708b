//! # Gridgate Gateway
//!
//! Axum adapters for the gridgate request gate: authentication
//! extractors, per-client rate-limit middleware, HTTP error mapping, and
//! environment configuration.
//!
//! The application's router composes these in front of its handlers; the
//! gate itself never defines routes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Gate configuration loaded from defaults, a builder, or the
/// environment.
pub mod config;
mod error;
mod extract;
/// Rate-limit middleware and quota response headers.
pub mod middleware;
mod state;

pub use config::{ConfigError, GateConfig, GateConfigBuilder};
pub use error::GateError;
pub use extract::{OptionalAuth, RequireAuth};
pub use middleware::rate_limit;
pub use state::GateState;
