//! Shared gate state for the axum boundary.

use std::sync::Arc;

use gridgate_core::{AuthOutcome, RateLimiter, TokenAuthenticator};

/// Shared authentication and throttling state.
///
/// Constructed once at startup (usually through
/// [`GateConfig::build_state`](crate::GateConfig::build_state)), wrapped
/// in an [`Arc`] and handed to the router. Both components are safe to
/// share across tasks; nothing here is a process-wide singleton, so tests
/// instantiate independent gates freely.
pub struct GateState {
    /// Token authenticator.
    pub authenticator: TokenAuthenticator,
    /// Per-client rate limiter.
    pub limiter: Arc<RateLimiter>,
}

impl GateState {
    /// Create a new gate state.
    #[must_use]
    pub fn new(authenticator: TokenAuthenticator, limiter: Arc<RateLimiter>) -> Self {
        Self {
            authenticator,
            limiter,
        }
    }

    /// Verify the raw `Authorization` header value.
    #[must_use]
    pub fn authenticate(&self, authorization_header: Option<&str>) -> AuthOutcome {
        self.authenticator.authenticate(authorization_header)
    }

    /// Start the limiter's background sweeper on the current runtime.
    pub fn start_sweeper(&self) {
        self.limiter.start_sweeper();
    }

    /// Stop the limiter's background sweeper.
    pub fn shutdown(&self) {
        self.limiter.shutdown();
    }
}

impl std::fmt::Debug for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateState")
            .field("authenticator", &self.authenticator)
            .field("policy", &self.limiter.policy())
            .finish_non_exhaustive()
    }
}
