//! Gatekeep CLI - credential lifecycle façade over Kong.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Gatekeep - signup, login rotation and API keys in front of Kong.
#[derive(Parser)]
#[command(name = "gatekeep")]
#[command(about = "Credential lifecycle façade over a Kong gateway")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.gatekeep/gatekeep.json).
    #[arg(short, long, global = true, env = "GATEKEEP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the auth HTTP server.
    Serve {
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address.
        #[arg(short, long)]
        bind: Option<String>,

        /// Force start even if the port is in use.
        #[arg(long)]
        force: bool,
    },

    /// Check whether the auth server is up.
    Status {
        /// Port the server listens on.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run credential operations directly against the store and Kong.
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a new identity.
    Signup {
        /// Identity (email).
        email: String,

        /// Password (prompted if omitted).
        #[arg(long, env = "GATEKEEP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Authenticate and rotate the gateway credential.
    Login {
        /// Identity (email).
        email: String,

        /// Password (prompted if omitted).
        #[arg(long, env = "GATEKEEP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Tear down the identity's gateway consumer.
    Logout {
        /// Identity (email).
        email: String,
    },

    /// Issue an API key for the identity's consumer.
    Apikey {
        /// Identity (email).
        email: String,

        /// Usage scope reported with the key.
        #[arg(long, default_value = gatekeep_auth::DEFAULT_USAGE_SCOPE)]
        usage_scope: String,
    },

    /// Check an access token against the current gateway secret.
    Verify {
        /// Identity (email).
        email: String,

        /// Access token.
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = cli.config;

    match cli.command {
        Commands::Serve { port, bind, force } => {
            commands::run_serve(commands::ServeArgs {
                config,
                port,
                bind,
                force,
            })
            .await?;
        }

        Commands::Status { port } => {
            commands::run_status(commands::StatusArgs { config, port }).await?;
        }

        Commands::User { action } => {
            let action = match action {
                UserCommands::Signup { email, password } => {
                    commands::UserAction::Signup { email, password }
                }
                UserCommands::Login { email, password } => {
                    commands::UserAction::Login { email, password }
                }
                UserCommands::Logout { email } => commands::UserAction::Logout { email },
                UserCommands::Apikey { email, usage_scope } => {
                    commands::UserAction::ApiKey { email, usage_scope }
                }
                UserCommands::Verify { email, token } => {
                    commands::UserAction::Verify { email, token }
                }
            };
            commands::run_user(commands::UserArgs { config, action }).await?;
        }
    }

    Ok(())
}
