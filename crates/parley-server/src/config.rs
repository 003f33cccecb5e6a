use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use parley_gateway::GatewayConfig;

/// Placeholder JWT secrets that should never reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub client_url: String,
    pub uploads_dir: PathBuf,
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unset keys take their defaults;
    /// set but unparsable numbers are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let interval_ms: u64 = parse(&lookup, "PARLEY_HEARTBEAT_INTERVAL_MS", 5000)?;
        let timeout_ms: u64 = parse(&lookup, "PARLEY_HEARTBEAT_TIMEOUT_MS", 1000)?;
        if interval_ms == 0 || timeout_ms == 0 {
            anyhow::bail!("heartbeat interval and timeout must be non-zero");
        }

        Ok(Self {
            host: var("PARLEY_HOST", "0.0.0.0"),
            port: parse(&lookup, "PARLEY_PORT", 4000)?,
            db_path: var("PARLEY_DB_PATH", "parley.db").into(),
            jwt_secret: var("PARLEY_JWT_SECRET", "dev-secret-change-me"),
            client_url: var("PARLEY_CLIENT_URL", "http://localhost:5173"),
            uploads_dir: var("PARLEY_UPLOADS_DIR", "./uploads").into(),
            gateway: GatewayConfig {
                heartbeat_interval: Duration::from_millis(interval_ms),
                heartbeat_timeout: Duration::from_millis(timeout_ms),
            },
        })
    }

    pub fn has_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        None => Ok(default),
    }
}
