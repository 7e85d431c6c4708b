//! Authentication and authorization for the request gate.
//!
//! This module provides:
//! - Role-based principals with capability checks
//! - Bearer token issuance and verification (HS256)
//! - A discriminated verification outcome the boundary maps onto HTTP
//!   status codes

mod principal;
mod token;

pub use principal::{Principal, Role};
pub use token::{AuthOutcome, Claims, DEFAULT_TOKEN_TTL, TokenAuthenticator};

use thiserror::Error;

/// Errors from authenticator construction and token issuance.
///
/// Verification never returns these: a bad credential degrades to a
/// negative [`AuthOutcome`], not an error.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token encoding failed.
    #[error("Token error: {0}")]
    TokenError(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}
