//! CLI command implementations.

mod serve;
mod status;
mod user;

use std::path::Path;

use anyhow::Context;
use gatekeep_core::Config;

pub use serve::{ServeArgs, run_serve};
pub use status::{StatusArgs, run_status};
pub use user::{UserAction, UserArgs, run_user};

/// Load the config file (or defaults) and apply environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };
    config
        .with_env_overrides()
        .context("Invalid environment override")
}
