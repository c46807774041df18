//! Kong admin API client.

use std::time::Duration;

use async_trait::async_trait;
use gatekeep_core::config::KongSection;
use gatekeep_core::secrets::{COMMON_SECRET_PATTERNS, GatewaySecret, scrub_secrets};
use rand::{Rng, distributions::Alphanumeric};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::traits::{Consumer, GatewayAdmin, GatewayError, JwtCredential, KeyAuthCredential};

const DEFAULT_ADMIN_URL: &str = "http://localhost:8001";
const USER_AGENT: &str = concat!("gatekeep/", env!("CARGO_PKG_VERSION"));
const JWT_ALGORITHM: &str = "HS256";

/// Length of generated API keys.
pub const API_KEY_LENGTH: usize = 32;

/// Kong admin client settings.
#[derive(Debug, Clone)]
pub struct KongConfig {
    /// Admin API base URL.
    pub admin_url: String,
    /// Timeout for reads and creates.
    pub request_timeout: Duration,
    /// Timeout for deletes. Kong cascades consumer deletes, so these run longer.
    pub delete_timeout: Duration,
}

impl Default for KongConfig {
    fn default() -> Self {
        Self {
            admin_url: DEFAULT_ADMIN_URL.to_string(),
            request_timeout: Duration::from_secs(5),
            delete_timeout: Duration::from_secs(20),
        }
    }
}

impl From<&KongSection> for KongConfig {
    fn from(section: &KongSection) -> Self {
        Self {
            admin_url: section.admin_url.clone(),
            request_timeout: section.request_timeout(),
            delete_timeout: section.delete_timeout(),
        }
    }
}

/// Generate a 32-character alphanumeric API key.
#[must_use]
pub fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ConsumerRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct KongJwt {
    id: String,
    key: String,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    consumer: Option<ConsumerRef>,
}

#[derive(Debug, Deserialize)]
struct KongJwtSecret {
    #[serde(default)]
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KongKeyAuth {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    consumer: Option<ConsumerRef>,
}

/// Kong admin API client.
pub struct KongAdminClient {
    client: Client,
    base_url: Url,
    config: KongConfig,
}

impl KongAdminClient {
    /// Create a client for the configured admin URL.
    ///
    /// # Errors
    ///
    /// Returns error if the admin URL is invalid or the HTTP client cannot be built.
    pub fn new(config: KongConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(config.admin_url.trim())
            .map_err(|e| GatewayError::Config(format!("admin URL {}: {e}", config.admin_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "admin URL {} cannot be a base",
                config.admin_url
            )));
        }

        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Admin URL this client talks to.
    #[must_use]
    pub fn admin_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build a URL from path segments, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| GatewayError::Config("admin URL cannot be a base".to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn send(request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Api {
            status,
            body: scrub_secrets(&body, COMMON_SECRET_PATTERNS),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GatewayAdmin for KongAdminClient {
    async fn create_consumer(&self, identity: &str) -> Result<Consumer, GatewayError> {
        debug!(identity, "Creating Kong consumer");
        let url = self.url(&["consumers"])?;
        let request = self
            .client
            .post(url)
            .timeout(self.config.request_timeout)
            .json(&json!({ "username": identity }));

        Self::decode(Self::send(request).await?).await
    }

    async fn consumer_exists(&self, identity: &str) -> Result<bool, GatewayError> {
        let url = self.url(&["consumers", identity])?;
        let request = self.client.get(url).timeout(self.config.request_timeout);

        match Self::send(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_consumer(&self, identity: &str) -> Result<(), GatewayError> {
        debug!(identity, "Deleting Kong consumer");
        let url = self.url(&["consumers", identity])?;
        let request = self.client.delete(url).timeout(self.config.delete_timeout);

        Self::send(request).await?;
        Ok(())
    }

    async fn create_credential(&self, identity: &str) -> Result<JwtCredential, GatewayError> {
        debug!(identity, "Creating Kong JWT credential");
        let url = self.url(&["consumers", identity, "jwt"])?;
        let request = self
            .client
            .post(url)
            .timeout(self.config.request_timeout)
            .json(&json!({ "key": identity, "algorithm": JWT_ALGORITHM }));

        let raw: KongJwt = Self::decode(Self::send(request).await?).await?;
        let secret = raw
            .secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::SecretUnavailable(raw.id.clone()))?;

        Ok(JwtCredential {
            id: raw.id,
            key: raw.key,
            consumer_id: raw.consumer.map(|c| c.id),
            secret: GatewaySecret::new(secret),
        })
    }

    async fn delete_credential(
        &self,
        identity: &str,
        credential_id: &str,
    ) -> Result<(), GatewayError> {
        debug!(identity, credential_id, "Deleting Kong JWT credential");
        let url = self.url(&["consumers", identity, "jwt", credential_id])?;
        let request = self.client.delete(url).timeout(self.config.delete_timeout);

        Self::send(request).await?;
        Ok(())
    }

    async fn fetch_credential_secret(
        &self,
        credential_id: &str,
    ) -> Result<GatewaySecret, GatewayError> {
        let url = self.url(&["jwt-secrets", credential_id])?;
        let request = self.client.get(url).timeout(self.config.request_timeout);

        let raw: KongJwtSecret = Self::decode(Self::send(request).await?).await?;
        raw.secret
            .filter(|s| !s.is_empty())
            .map(GatewaySecret::new)
            .ok_or_else(|| GatewayError::SecretUnavailable(credential_id.to_string()))
    }

    async fn create_api_key(&self, identity: &str) -> Result<KeyAuthCredential, GatewayError> {
        debug!(identity, "Creating Kong key-auth credential");
        let key = generate_api_key();
        let url = self.url(&["consumers", identity, "key-auth"])?;
        let request = self
            .client
            .post(url)
            .timeout(self.config.request_timeout)
            .json(&json!({ "key": key }));

        let raw: KongKeyAuth = Self::decode(Self::send(request).await?).await?;
        Ok(KeyAuthCredential {
            id: raw.id,
            key: raw.key.unwrap_or(key),
            consumer_id: raw.consumer.map(|c| c.id),
        })
    }
}
