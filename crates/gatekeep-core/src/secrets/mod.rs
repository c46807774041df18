//! Secret handling.
//!
//! - `GatewaySecret`: signing secret held by the gateway, never logged or persisted
//! - `scrub_secrets`: redact secrets from gateway error bodies before logging

use secrecy::{ExposeSecret, SecretBox};

/// Per-user signing secret held by the gateway.
///
/// The inner value is wrapped with `secrecy::SecretBox`. Not `Serialize`:
/// the secret must never reach the user directory or a response body.
#[derive(Clone)]
pub struct GatewaySecret(SecretBox<str>);

impl GatewaySecret {
    /// Wrap a secret.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self(SecretBox::new(secret.into_boxed_str()))
    }

    /// Expose the secret for signing.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for GatewaySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GatewaySecret([REDACTED])")
    }
}

impl std::fmt::Display for GatewaySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Scrub secrets from error messages and logs.
///
/// Replaces values after known secret patterns with `[REDACTED]`.
///
/// # Arguments
///
/// * `text` - Text to scrub
/// * `patterns` - Patterns to look for (e.g., `["secret=", "\"key\":\""]`)
#[must_use]
pub fn scrub_secrets(text: &str, patterns: &[&str]) -> String {
    let mut result = text.to_string();

    for pattern in patterns {
        let mut search_start = 0;
        while let Some(start) = result[search_start..].find(pattern) {
            let abs_start = search_start + start + pattern.len();

            let end = result[abs_start..]
                .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '&' || c == ',')
                .map_or(result.len(), |e| abs_start + e);

            result.replace_range(abs_start..end, "[REDACTED]");

            search_start = abs_start + "[REDACTED]".len();
        }
    }

    result
}

/// Secret patterns found in gateway responses and request logs.
pub const COMMON_SECRET_PATTERNS: &[&str] = &[
    "\"secret\":\"",
    "\"secret\": \"",
    "\"key\":\"",
    "\"key\": \"",
    "\"password\":\"",
    "secret=",
    "password=",
    "apikey=",
    "Authorization: Bearer ",
];
