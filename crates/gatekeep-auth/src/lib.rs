//! # Gatekeep Auth
//!
//! Credential lifecycle orchestration over a Kong-style gateway, plus the
//! HTTP surface exposing it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Users, tokens, rotation locks and the orchestrator.
pub mod auth;
mod server;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use gatekeep_core::Config;
use gatekeep_kong::{KongAdminClient, KongConfig};

pub use auth::{
    AuthConfig, AuthError, Claims, CredentialOrchestrator, TokenIssuer, UserDirectory, UserRecord,
    UserRole, UserStore,
};
pub use server::{AuthServer, DEFAULT_USAGE_SCOPE, ServerConfig, router};

/// Wire an orchestrator from configuration: Kong admin client plus sled store.
///
/// # Errors
///
/// Returns error if the admin URL is invalid or the store cannot be opened.
pub fn build_orchestrator(config: &Config) -> Result<CredentialOrchestrator, ServerError> {
    let gateway = KongAdminClient::new(KongConfig::from(&config.kong))
        .map_err(|e| ServerError::Config(format!("Kong client: {e}")))?;

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .map_err(|e| ServerError::Config(format!("Failed to create data dir: {e}")))?;
    let store = UserStore::open(&data_dir)
        .map_err(|e| ServerError::Config(format!("User store: {e}")))?;

    Ok(CredentialOrchestrator::new(
        Arc::new(gateway),
        Arc::new(store),
        AuthConfig::from(config),
    ))
}

/// Start the auth server.
///
/// # Errors
///
/// Returns error if wiring fails or the server cannot start.
pub async fn start(config: &Config) -> Result<(), ServerError> {
    let orchestrator = Arc::new(build_orchestrator(config)?);
    let server = AuthServer::new(ServerConfig::from(&config.server), orchestrator);
    server.run().await
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
