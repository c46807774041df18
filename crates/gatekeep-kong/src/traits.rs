//! Gateway admin traits.

use async_trait::async_trait;
use gatekeep_core::secrets::GatewaySecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gateway admin errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Gateway answered with a non-2xx status.
    #[error("Kong Admin API error: {status} {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, scrubbed of secret values.
        body: String,
    },

    /// Network error or timeout.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Credential exists but no secret was returned for it.
    #[error("Secret unavailable for credential {0}")]
    SecretUnavailable(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// True only for an upstream 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Upstream status code, if the gateway answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Gateway consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    /// Gateway-assigned consumer id.
    pub id: String,
    /// Consumer username (the user identity).
    pub username: String,
}

/// JWT credential bound to a consumer.
#[derive(Debug, Clone)]
pub struct JwtCredential {
    /// Gateway-assigned credential id.
    pub id: String,
    /// Credential key (the user identity, used as `iss`).
    pub key: String,
    /// Owning consumer id, when the gateway reports it.
    pub consumer_id: Option<String>,
    /// HS256 signing secret.
    pub secret: GatewaySecret,
}

/// Key-auth credential bound to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAuthCredential {
    /// Gateway-assigned credential id.
    pub id: Option<String>,
    /// The API key.
    pub key: String,
    /// Owning consumer id, when the gateway reports it.
    pub consumer_id: Option<String>,
}

/// Admin operations against an API gateway.
///
/// Calls are not assumed idempotent and are never retried.
#[async_trait]
pub trait GatewayAdmin: Send + Sync {
    /// Create a consumer whose username is the identity.
    async fn create_consumer(&self, identity: &str) -> Result<Consumer, GatewayError>;

    /// Probe for a consumer. A 404 is `Ok(false)`.
    async fn consumer_exists(&self, identity: &str) -> Result<bool, GatewayError>;

    /// Delete a consumer and, gateway-side, everything bound to it.
    async fn delete_consumer(&self, identity: &str) -> Result<(), GatewayError>;

    /// Create an HS256 JWT credential keyed by the identity.
    async fn create_credential(&self, identity: &str) -> Result<JwtCredential, GatewayError>;

    /// Delete one JWT credential of a consumer.
    async fn delete_credential(
        &self,
        identity: &str,
        credential_id: &str,
    ) -> Result<(), GatewayError>;

    /// Fetch the secret of an existing JWT credential.
    async fn fetch_credential_secret(
        &self,
        credential_id: &str,
    ) -> Result<GatewaySecret, GatewayError>;

    /// Create a key-auth credential with a freshly generated key.
    async fn create_api_key(&self, identity: &str) -> Result<KeyAuthCredential, GatewayError>;
}
