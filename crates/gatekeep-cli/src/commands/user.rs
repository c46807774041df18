//! User commands - drive credential operations from the terminal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use gatekeep_auth::{CredentialOrchestrator, build_orchestrator};
use tracing::debug;

use crate::ui;

/// Arguments for user commands.
pub struct UserArgs {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// The action to perform.
    pub action: UserAction,
}

/// User actions.
pub enum UserAction {
    /// Register an identity.
    Signup {
        email: String,
        password: Option<String>,
    },
    /// Log in, rotating the gateway credential.
    Login {
        email: String,
        password: Option<String>,
    },
    /// Remove the gateway consumer.
    Logout { email: String },
    /// Issue an API key.
    ApiKey { email: String, usage_scope: String },
    /// Verify an access token.
    Verify { email: String, token: String },
}

/// Run the user command.
///
/// # Errors
///
/// Returns error if wiring fails or the operation is rejected.
pub async fn run_user(args: UserArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    debug!(
        data_dir = %config.data_dir().display(),
        kong = %config.kong.admin_url,
        "Opening directory"
    );
    let orchestrator =
        build_orchestrator(&config).context("Failed to set up credential orchestrator")?;

    execute(&orchestrator, args.action).await
}

async fn execute(orchestrator: &CredentialOrchestrator, action: UserAction) -> Result<()> {
    match action {
        UserAction::Signup { email, password } => {
            let password = resolve_password(password)?;
            let outcome = orchestrator.signup(&email, &password).await?;
            ui::success(&format!("Registered {}", outcome.identity));
        }
        UserAction::Login { email, password } => {
            let password = resolve_password(password)?;
            let outcome = orchestrator.login(&email, &password).await?;
            ui::success(&format!("Logged in as {email}"));
            ui::kv("Token type", &outcome.token_type);
            println!("{}", outcome.access_token);
        }
        UserAction::Logout { email } => {
            let outcome = orchestrator.logout(&email).await?;
            ui::success(&outcome.message);
        }
        UserAction::ApiKey { email, usage_scope } => {
            let outcome = orchestrator.generate_api_key(&email, &usage_scope).await?;
            ui::success(&format!("API key issued for {}", outcome.identity));
            ui::kv(
                "Consumer",
                outcome.consumer_id.as_deref().unwrap_or("unknown"),
            );
            ui::kv("Usage scope", &outcome.usage_scope);
            println!("{}", outcome.key);
        }
        UserAction::Verify { email, token } => {
            let claims = orchestrator.verify_access_token(&email, &token).await?;
            ui::success("Token is valid");
            ui::kv("Issuer", &claims.iss);
            if let Some(role) = claims.role {
                ui::kv("Role", &role.to_string());
            }
            if let Some(aud) = &claims.aud {
                ui::kv("Audience", aud);
            }
            ui::kv("Expires", &format_timestamp(claims.exp));
        }
    }
    Ok(())
}

/// Use the given password or prompt for one.
fn resolve_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => ui::password("Password").context("Failed to read password"),
    }
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map_or_else(|| secs.to_string(), |at| at.to_rfc3339())
}
