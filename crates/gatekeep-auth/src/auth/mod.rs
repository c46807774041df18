//! Credential lifecycle for gateway-backed users.
//!
//! This module provides:
//! - User directory with argon2id password hashes
//! - Access tokens signed with gateway-held secrets
//! - Per-identity serialization of credential rotation
//! - The orchestrator tying the directory and the gateway together

mod config;
mod locks;
mod orchestrator;
mod token;
mod users;

pub use config::{AuthConfig, AuthConfigBuilder};
pub use locks::{IdentityGuard, IdentityLocks};
pub use orchestrator::{
    ApiKeyOutcome, CredentialOrchestrator, LOGOUT_MESSAGE, LoginOutcome, LogoutOutcome,
    SignupOutcome, TOKEN_TYPE,
};
pub use token::{Claims, IssuedToken, TokenIssuer};
pub use users::{DirectoryError, UserDirectory, UserRecord, UserRole, UserStore};

use gatekeep_core::ValidationError;
use gatekeep_kong::GatewayError;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input failed validation, or credentials did not match.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Identity already registered.
    #[error("User already exists")]
    Conflict(String),

    /// Identity not registered.
    #[error("User not found")]
    NotFound(String),

    /// Local directory write or read failed.
    #[error("Failed to persist user: {0}")]
    Persistence(String),

    /// Gateway call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Token signing or verification failed.
    #[error("Token error: {0}")]
    Token(String),

    /// Password hashing failed or a stored hash is unreadable.
    #[error("Password hashing error: {0}")]
    Hashing(String),
}

impl AuthError {
    /// Whether retrying the same request might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Gateway(_))
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Exists(identity) => Self::Conflict(identity),
            DirectoryError::Storage(msg) => Self::Persistence(msg),
        }
    }
}
