//! Gate configuration.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridgate_core::{RateLimitPolicy, RateLimiter, TokenAuthenticator};

use crate::state::GateState;

/// Default token expiry in hours.
const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 24;
/// Default rate-limit window in milliseconds.
const DEFAULT_WINDOW_MS: u64 = 60_000;
/// Default requests admitted per window.
const DEFAULT_MAX_REQUESTS: u32 = 100;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing configuration: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Token signing secret. Hex-decoded when possible, used as raw
    /// bytes otherwise. Required to build a gate.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Access token expiry in hours.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,

    /// Clock-skew leeway in seconds when checking token expiry.
    #[serde(default)]
    pub leeway_seconds: u64,

    /// Rate-limit window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests admitted per client per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_token_expiry() -> u64 {
    DEFAULT_TOKEN_EXPIRY_HOURS
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_expiry_hours: default_token_expiry(),
            leeway_seconds: 0,
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl GateConfig {
    /// Create a new config builder.
    #[must_use]
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::default()
    }

    /// Get token expiry as a [`Duration`].
    #[must_use]
    pub const fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_hours * 3600)
    }

    /// Get the rate-limit policy.
    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.window_ms, self.max_requests)
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("GRIDGATE_TOKEN_SECRET") {
            self.token_secret = Some(secret);
        }

        if let Some(hours) = env_parse("GRIDGATE_TOKEN_EXPIRY_HOURS") {
            self.token_expiry_hours = hours;
        }

        if let Some(window_ms) = env_parse("GRIDGATE_RATE_WINDOW_MS") {
            self.window_ms = window_ms;
        }

        if let Some(max_requests) = env_parse("GRIDGATE_RATE_MAX_REQUESTS") {
            self.max_requests = max_requests;
        }

        self
    }

    /// Construct the gate from this configuration.
    ///
    /// The secret is treated as hex when it decodes as hex and as raw
    /// bytes otherwise, so both generated and human-chosen secrets work.
    ///
    /// # Errors
    ///
    /// Returns error when the secret is missing or empty, or when the
    /// window length is zero.
    pub fn build_state(&self) -> Result<GateState, ConfigError> {
        let secret = self
            .token_secret
            .as_deref()
            .ok_or(ConfigError::Missing("token secret"))?;
        if secret.is_empty() {
            return Err(ConfigError::Invalid("token secret"));
        }
        if self.window_ms == 0 {
            return Err(ConfigError::Invalid("rate window"));
        }

        let ttl = self.token_expiry();
        let authenticator = TokenAuthenticator::from_hex_secret(secret, ttl)
            .unwrap_or_else(|_| TokenAuthenticator::new(secret.as_bytes(), ttl))
            .with_leeway(self.leeway_seconds);

        let limiter = Arc::new(RateLimiter::new(self.policy()));
        Ok(GateState::new(authenticator, limiter))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Builder for [`GateConfig`].
#[derive(Debug, Default)]
pub struct GateConfigBuilder {
    config: GateConfig,
}

impl GateConfigBuilder {
    /// Set the token signing secret.
    #[must_use]
    pub fn token_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.token_secret = Some(secret.into());
        self
    }

    /// Set token expiry in hours.
    #[must_use]
    pub fn token_expiry_hours(mut self, hours: u64) -> Self {
        self.config.token_expiry_hours = hours;
        self
    }

    /// Set the expiry-check leeway in seconds.
    #[must_use]
    pub fn leeway_seconds(mut self, seconds: u64) -> Self {
        self.config.leeway_seconds = seconds;
        self
    }

    /// Set the rate-limit window in milliseconds.
    #[must_use]
    pub fn window_ms(mut self, window_ms: u64) -> Self {
        self.config.window_ms = window_ms;
        self
    }

    /// Set the per-window request cap.
    #[must_use]
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> GateConfig {
        self.config
    }
}
