//! Credential lifecycle orchestration.
//!
//! Keeps the local user record and the gateway's consumer and JWT credential
//! consistent across signup, login (rotation), logout and API-key issuance.
//!
//! Per identity:
//!
//! ```text
//! UNPROVISIONED --login--> PROVISIONED --login--> PROVISIONED (rotated)
//!       ^                                               |
//!       +-------------------- logout -------------------+
//! ```

use std::sync::Arc;

use gatekeep_core::{ValidationError, validate_identity, validate_password};
use gatekeep_kong::{GatewayAdmin, GatewayError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::config::AuthConfig;
use super::locks::IdentityLocks;
use super::token::{Claims, TokenIssuer};
use super::users::{UserDirectory, UserRecord};
use super::AuthError;

/// Token type reported with every access token.
pub const TOKEN_TYPE: &str = "Bearer";

/// Message returned by a successful logout.
pub const LOGOUT_MESSAGE: &str = "Logout successful. Please delete your token on the client.";

/// Result of a signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupOutcome {
    /// The registered identity.
    pub identity: String,
}

/// Result of a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    /// Signed access token.
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
}

/// Result of a logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutOutcome {
    /// Confirmation message.
    pub message: String,
}

/// Result of API-key issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyOutcome {
    /// Identity the key belongs to.
    pub identity: String,
    /// The new API key.
    pub key: String,
    /// Consumer the key is bound to.
    pub consumer_id: Option<String>,
    /// Caller-supplied label, echoed back.
    pub usage_scope: String,
}

/// Sequences gateway, directory and token calls for each operation.
#[derive(Clone)]
pub struct CredentialOrchestrator {
    gateway: Arc<dyn GatewayAdmin>,
    directory: Arc<dyn UserDirectory>,
    issuer: TokenIssuer,
    locks: IdentityLocks,
    config: AuthConfig,
}

impl CredentialOrchestrator {
    /// Create an orchestrator over a gateway and a directory.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn GatewayAdmin>,
        directory: Arc<dyn UserDirectory>,
        config: AuthConfig,
    ) -> Self {
        let issuer = TokenIssuer::new(config.token_lifetime(), config.audience.clone());
        Self {
            gateway,
            directory,
            issuer,
            locks: IdentityLocks::new(),
            config,
        }
    }

    /// Token issuer used for logins.
    #[must_use]
    pub const fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Register a new identity. No gateway call is made.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed input, `Conflict` if the identity
    /// is taken, `Persistence` if the record cannot be written.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, identity: &str, password: &str) -> Result<SignupOutcome, AuthError> {
        validate_identity(identity)?;
        validate_password(password)?;

        if self.directory.get(identity)?.is_some() {
            return Err(AuthError::Conflict(identity.to_string()));
        }

        let record = UserRecord::new(identity, password, self.config.signup_role)?;
        // a concurrent signup that won the race surfaces as Conflict here
        self.directory.create(&record)?;

        info!(role = %record.role, "User registered");
        Ok(SignupOutcome {
            identity: identity.to_string(),
        })
    }

    /// Authenticate and rotate the identity's gateway credential.
    ///
    /// Unknown identities and wrong passwords yield the same
    /// `InvalidCredentials` error.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed input or bad credentials, `Gateway`
    /// if provisioning fails, `Persistence` if the new ids cannot be stored.
    #[instrument(skip(self, password))]
    pub async fn login(&self, identity: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        validate_identity(identity)?;
        validate_password(password)?;

        let record = self
            .directory
            .get(identity)?
            .ok_or(ValidationError::InvalidCredentials)?;
        record.verify_password(password)?;

        let _guard = self.locks.acquire(identity).await;

        // re-read under the lock so teardown sees the latest credential
        let mut record = self
            .directory
            .get(identity)?
            .ok_or(ValidationError::InvalidCredentials)?;

        if self.teardown(identity, &mut record).await? {
            self.settle(identity).await;
        }

        let consumer = self.gateway.create_consumer(identity).await?;
        let credential = self.gateway.create_credential(identity).await?;
        let issued = self
            .issuer
            .issue(identity, Some(record.role), &credential.secret)?;

        record.gateway_consumer_id = Some(credential.consumer_id.unwrap_or(consumer.id));
        record.gateway_credential_id = Some(credential.id);
        self.directory.upsert(record)?;

        info!(expires_at = %issued.expires_at, "Credentials rotated");
        Ok(LoginOutcome {
            access_token: issued.token,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    /// Remove the identity's gateway consumer and credential.
    ///
    /// Already-absent gateway objects count as removed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown identities, `Gateway` for any gateway
    /// failure other than 404, `Persistence` if the record cannot be updated.
    #[instrument(skip(self))]
    pub async fn logout(&self, identity: &str) -> Result<LogoutOutcome, AuthError> {
        validate_identity(identity)?;

        if self.directory.get(identity)?.is_none() {
            return Err(AuthError::NotFound(identity.to_string()));
        }

        let _guard = self.locks.acquire(identity).await;
        let mut record = self
            .directory
            .get(identity)?
            .ok_or_else(|| AuthError::NotFound(identity.to_string()))?;

        absent_ok(self.gateway.delete_consumer(identity).await, "consumer")?;

        // the consumer delete cascades to its credentials
        let credential_id = record.gateway_credential_id.take();
        record.gateway_consumer_id = None;
        self.directory.upsert(record)?;

        if let Some(credential_id) = credential_id {
            absent_ok(
                self.gateway.delete_credential(identity, &credential_id).await,
                "credential",
            )?;
        }

        info!("Logged out");
        Ok(LogoutOutcome {
            message: LOGOUT_MESSAGE.to_string(),
        })
    }

    /// Issue a new API key for the identity's consumer.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown identities and `Gateway` if the
    /// gateway rejects the key (e.g. no consumer provisioned).
    #[instrument(skip(self))]
    pub async fn generate_api_key(
        &self,
        identity: &str,
        usage_scope: &str,
    ) -> Result<ApiKeyOutcome, AuthError> {
        let record = self
            .directory
            .get(identity)?
            .ok_or_else(|| AuthError::NotFound(identity.to_string()))?;

        let credential = self.gateway.create_api_key(identity).await?;

        info!("API key issued");
        Ok(ApiKeyOutcome {
            identity: identity.to_string(),
            key: credential.key,
            consumer_id: credential.consumer_id.or(record.gateway_consumer_id),
            usage_scope: usage_scope.to_string(),
        })
    }

    /// Check a token against the identity's current gateway secret.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the identity is unknown or not provisioned,
    /// `Gateway` if the secret cannot be fetched, `Token` if verification fails.
    #[instrument(skip(self, token))]
    pub async fn verify_access_token(
        &self,
        identity: &str,
        token: &str,
    ) -> Result<Claims, AuthError> {
        let record = self
            .directory
            .get(identity)?
            .ok_or_else(|| AuthError::NotFound(identity.to_string()))?;
        let credential_id = record
            .gateway_credential_id
            .ok_or_else(|| AuthError::NotFound(identity.to_string()))?;

        let secret = self.gateway.fetch_credential_secret(&credential_id).await?;
        let claims = self.issuer.verify(token, &secret)?;

        if claims.iss != identity {
            return Err(AuthError::Token(format!(
                "Token issued for {}, not {identity}",
                claims.iss
            )));
        }
        Ok(claims)
    }

    /// Best-effort removal of the previous consumer and credential.
    ///
    /// Returns whether the consumer is gone. If it could not be deleted the
    /// previous credential is left in place and the record is untouched;
    /// otherwise the stored ids are cleared before the credential cleanup.
    async fn teardown(&self, identity: &str, record: &mut UserRecord) -> Result<bool, AuthError> {
        match self.gateway.delete_consumer(identity).await {
            Ok(()) => debug!("Deleted previous consumer"),
            Err(e) if e.is_not_found() => debug!("No previous consumer"),
            Err(e) => {
                warn!(error = %e, "Failed to delete previous consumer, keeping previous credential");
                return Ok(false);
            }
        }

        let consumer_id = record.gateway_consumer_id.take();
        let credential_id = record.gateway_credential_id.take();
        if consumer_id.is_some() || credential_id.is_some() {
            *record = self.directory.upsert(record.clone())?;
        }

        if let Some(credential_id) = credential_id.as_deref() {
            match self.gateway.delete_credential(identity, credential_id).await {
                Ok(()) => debug!(credential_id, "Deleted previous credential"),
                Err(e) if e.is_not_found() => {
                    debug!(credential_id, "Previous credential removed with consumer");
                }
                Err(e) => warn!(credential_id, error = %e, "Failed to delete previous credential"),
            }
        }

        Ok(true)
    }

    /// Wait until the gateway reports the consumer gone, within the settle timeout.
    async fn settle(&self, identity: &str) {
        let interval = self.config.settle_poll_interval();
        let probe = async {
            loop {
                match self.gateway.consumer_exists(identity).await {
                    Ok(false) => return,
                    Ok(true) => tokio::time::sleep(interval).await,
                    Err(e) => {
                        warn!(error = %e, "Consumer probe failed, continuing");
                        return;
                    }
                }
            }
        };

        if tokio::time::timeout(self.config.settle_timeout(), probe)
            .await
            .is_err()
        {
            warn!(
                timeout_ms = self.config.settle_timeout_ms,
                "Consumer still present after settle timeout, continuing"
            );
        }
    }
}

/// Treat an upstream 404 as already removed.
fn absent_ok(result: Result<(), GatewayError>, object: &str) -> Result<(), GatewayError> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!(object, "Already absent");
            Ok(())
        }
        other => other,
    }
}
