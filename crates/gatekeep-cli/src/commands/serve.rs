//! Serve command - run the auth HTTP server.

use std::path::PathBuf;

use anyhow::Result;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address.
    pub bind: Option<String>,
    /// Start even if the port looks taken.
    pub force: bool,
}

/// Start the auth server.
///
/// # Errors
///
/// Returns error if config loading fails or the server cannot start.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    config.validate()?;

    let address = format!("{}:{}", config.server.bind, config.server.port);

    if !args.force && std::net::TcpListener::bind(&address).is_err() {
        ui::error(&format!(
            "Port {} is already in use. Use --force to override.",
            config.server.port
        ));
        return Ok(());
    }

    ui::header("Starting Gatekeep");
    ui::kv("Address", &address);
    ui::kv("Kong admin", &config.kong.admin_url);
    ui::kv("Data dir", &config.data_dir().display().to_string());
    ui::kv(
        "Token lifetime",
        &format!("{}s", config.token.lifetime_secs),
    );
    if let Some(audience) = config.token.audience() {
        ui::kv("Audience", audience);
    }
    println!();

    ui::info("Press Ctrl+C to stop");
    println!();

    gatekeep_auth::start(&config).await?;

    Ok(())
}
