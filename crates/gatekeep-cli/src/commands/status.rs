//! Status command - probe a running auth server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::ui::{self, HealthStatus};

/// Status command arguments.
#[derive(Debug, Clone, Default)]
pub struct StatusArgs {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// Port override.
    pub port: Option<u16>,
}

/// Run the status command.
///
/// # Errors
///
/// Returns error if the config cannot be loaded.
pub async fn run_status(args: StatusArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let port = args.port.unwrap_or(config.server.port);

    ui::header("Gatekeep Status");

    if tokio::net::TcpStream::connect(format!("127.0.0.1:{port}"))
        .await
        .is_err()
    {
        ui::health_check("Server", HealthStatus::Warning, Some("not running"));
        ui::info("  Start with: gatekeep serve");
        return Ok(());
    }

    ui::health_check("Server", HealthStatus::Ok, Some("running"));
    ui::kv("  Port", &port.to_string());

    match probe_health(port).await {
        Ok(true) => ui::health_check("Health endpoint", HealthStatus::Ok, None),
        Ok(false) => ui::health_check("Health endpoint", HealthStatus::Error, Some("not ok")),
        Err(e) => ui::health_check("Health endpoint", HealthStatus::Error, Some(&e)),
    }

    ui::kv("Kong admin", &config.kong.admin_url);

    Ok(())
}

/// Hit `/auth/healthz` and read its `ok` flag.
async fn probe_health(port: u16) -> Result<bool, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| e.to_string())?;

    let resp = client
        .get(format!("http://127.0.0.1:{port}/auth/healthz"))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !resp.status().is_success() {
        return Err(format!("HTTP {}", resp.status()));
    }

    let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
    Ok(health_ok(&body))
}

fn health_ok(body: &serde_json::Value) -> bool {
    body.get("ok")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_ok() {
        assert!(health_ok(&json!({"ok": true})));
        assert!(!health_ok(&json!({"ok": false})));
        assert!(!health_ok(&json!({"status": "up"})));
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(probe_health(port).await.is_err());
    }
}
