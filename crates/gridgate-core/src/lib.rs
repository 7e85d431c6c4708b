//! # Gridgate Core
//!
//! Request-gating primitives for the API boundary of a sports-analytics
//! service.
//!
//! This crate provides:
//! - Bearer token issuance and verification with role-based principals
//! - A fixed-window per-client rate limiter with background eviction
//! - Client identity resolution for rate-limit bucketing
//!
//! Everything here is pure in-memory computation: no I/O, no suspension
//! points on the request path. HTTP adapters live in `gridgate-gateway`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod ratelimit;
pub mod resolver;

pub use auth::{AuthError, AuthOutcome, Claims, Principal, Role, TokenAuthenticator};
pub use ratelimit::{RateDecision, RateLimitPolicy, RateLimiter, RateLimiterStats};
pub use resolver::resolve_client_key;
