//! Configuration loading and validation.
//!
//! Config is JSON5 with camelCase keys.
//! Config location: `~/.gatekeep/gatekeep.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Kong admin API settings.
    #[serde(default)]
    pub kong: KongSection,

    /// Access token settings.
    #[serde(default)]
    pub token: TokenSection,

    /// Credential rotation settings.
    #[serde(default)]
    pub rotation: RotationSection,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageSection,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("gatekeep.json")
    }

    /// Get the Gatekeep state directory.
    ///
    /// Uses `GATEKEEP_STATE_DIR` env var if set, otherwise `~/.gatekeep`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("GATEKEEP_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".gatekeep")
        } else {
            PathBuf::from(".gatekeep")
        }
    }

    /// Directory holding the user directory database.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Apply overrides from the process environment.
    ///
    /// Recognised variables: `KONG_ADMIN_URL`, `JWT_EXP_SECONDS`, `JWT_AUD`,
    /// `HOST`, `PORT`.
    ///
    /// # Errors
    ///
    /// Returns error if an override is malformed or the result fails validation.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns error if an override is malformed or the result fails validation.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("KONG_ADMIN_URL") {
            self.kong.admin_url = url;
        }

        if let Some(secs) = lookup("JWT_EXP_SECONDS") {
            self.token.lifetime_secs = secs
                .trim()
                .parse()
                .map_err(|e| ConfigError::Validation(format!("JWT_EXP_SECONDS: {e}")))?;
        }

        if let Some(aud) = lookup("JWT_AUD") {
            self.token.audience = Some(aud);
        }

        if let Some(host) = lookup("HOST") {
            self.server.bind = host;
        }

        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::Validation(format!("PORT: {e}")))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        let url = self.kong.admin_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "Kong admin URL must be http(s): {url}"
            )));
        }

        if self.token.lifetime_secs == 0 {
            return Err(ConfigError::Validation(
                "Token lifetime cannot be 0".to_string(),
            ));
        }

        if self.rotation.settle_poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Settle poll interval cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Kong admin API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KongSection {
    /// Admin API base URL.
    #[serde(default = "default_admin_url")]
    pub admin_url: String,

    /// Timeout for reads and creates, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for deletes, in seconds.
    #[serde(default = "default_delete_timeout")]
    pub delete_timeout_secs: u64,
}

impl KongSection {
    /// Read/create timeout as Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delete timeout as Duration.
    #[must_use]
    pub const fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }
}

impl Default for KongSection {
    fn default() -> Self {
        Self {
            admin_url: default_admin_url(),
            request_timeout_secs: default_request_timeout(),
            delete_timeout_secs: default_delete_timeout(),
        }
    }
}

/// Access token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSection {
    /// Token lifetime in seconds.
    #[serde(default = "default_lifetime")]
    pub lifetime_secs: u64,

    /// Audience claim. Empty or missing omits `aud`.
    #[serde(default)]
    pub audience: Option<String>,
}

impl TokenSection {
    /// Token lifetime as Duration.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    /// Audience, with empty strings treated as unset.
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.audience
            .as_deref()
            .map(str::trim)
            .filter(|aud| !aud.is_empty())
    }
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            lifetime_secs: default_lifetime(),
            audience: None,
        }
    }
}

/// Credential rotation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationSection {
    /// How long to wait for the gateway to confirm teardown, in milliseconds.
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,

    /// Delay between absence probes, in milliseconds.
    #[serde(default = "default_settle_interval")]
    pub settle_poll_interval_ms: u64,
}

impl RotationSection {
    /// Settle timeout as Duration.
    #[must_use]
    pub const fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    /// Poll interval as Duration.
    #[must_use]
    pub const fn settle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settle_poll_interval_ms)
    }
}

impl Default for RotationSection {
    fn default() -> Self {
        Self {
            settle_timeout_ms: default_settle_timeout(),
            settle_poll_interval_ms: default_settle_interval(),
        }
    }
}

/// Local storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSection {
    /// Data directory override.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    9000
}

fn default_admin_url() -> String {
    "http://localhost:8001".to_string()
}

const fn default_request_timeout() -> u64 {
    5
}

const fn default_delete_timeout() -> u64 {
    20
}

const fn default_lifetime() -> u64 {
    86_400
}

const fn default_settle_timeout() -> u64 {
    2_000
}

const fn default_settle_interval() -> u64 {
    100
}
