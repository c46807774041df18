//! Orchestrator configuration.

use std::time::Duration;

use gatekeep_core::Config;
use serde::{Deserialize, Serialize};

use super::users::UserRole;

/// Default token lifetime in seconds.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 86_400;
/// Default settle timeout in milliseconds.
const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 2_000;
/// Default settle poll interval in milliseconds.
const DEFAULT_SETTLE_INTERVAL_MS: u64 = 100;

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Access token lifetime in seconds.
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,

    /// Audience claim. `None` omits `aud`.
    #[serde(default)]
    pub audience: Option<String>,

    /// Role assigned at signup.
    #[serde(default = "default_signup_role")]
    pub signup_role: UserRole,

    /// Upper bound on waiting for teardown to be visible, in milliseconds.
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,

    /// Delay between consumer absence probes, in milliseconds.
    #[serde(default = "default_settle_interval")]
    pub settle_poll_interval_ms: u64,
}

const fn default_token_lifetime() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

const fn default_signup_role() -> UserRole {
    UserRole::User
}

const fn default_settle_timeout() -> u64 {
    DEFAULT_SETTLE_TIMEOUT_MS
}

const fn default_settle_interval() -> u64 {
    DEFAULT_SETTLE_INTERVAL_MS
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_lifetime_secs: default_token_lifetime(),
            audience: None,
            signup_role: default_signup_role(),
            settle_timeout_ms: default_settle_timeout(),
            settle_poll_interval_ms: default_settle_interval(),
        }
    }
}

impl From<&Config> for AuthConfig {
    fn from(config: &Config) -> Self {
        Self {
            token_lifetime_secs: config.token.lifetime_secs,
            audience: config.token.audience().map(str::to_string),
            signup_role: default_signup_role(),
            settle_timeout_ms: config.rotation.settle_timeout_ms,
            settle_poll_interval_ms: config.rotation.settle_poll_interval_ms,
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Token lifetime as Duration.
    #[must_use]
    pub const fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }

    /// Settle timeout as Duration.
    #[must_use]
    pub const fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    /// Settle poll interval as Duration.
    #[must_use]
    pub const fn settle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settle_poll_interval_ms)
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set token lifetime in seconds.
    #[must_use]
    pub const fn token_lifetime_secs(mut self, secs: u64) -> Self {
        self.config.token_lifetime_secs = secs;
        self
    }

    /// Set the audience claim. Empty strings clear it.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        let audience = audience.into();
        self.config.audience = (!audience.is_empty()).then_some(audience);
        self
    }

    /// Set the role assigned at signup.
    #[must_use]
    pub const fn signup_role(mut self, role: UserRole) -> Self {
        self.config.signup_role = role;
        self
    }

    /// Set settle timeout in milliseconds.
    #[must_use]
    pub const fn settle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.settle_timeout_ms = ms;
        self
    }

    /// Set settle poll interval in milliseconds.
    #[must_use]
    pub const fn settle_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.settle_poll_interval_ms = ms;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}
