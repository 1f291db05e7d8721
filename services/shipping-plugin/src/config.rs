use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

// Plugin configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    // HTTP bind address for the plugin RPC surface.
    pub bind_addr: SocketAddr,
    // Metrics HTTP bind address.
    pub metrics_bind: SocketAddr,
    // Postgres connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,
    // Canada Post credentials and endpoint.
    pub canpost_base_url: String,
    pub canpost_username: String,
    pub canpost_password: String,
    pub canpost_customer_number: String,
    // Rate snapshot retention.
    pub rate_snapshot_ttl_minutes: u64,
    // Where label PDFs are written.
    pub label_storage_path: String,
    // Public base URL used to construct label download links.
    pub public_base_url: String,
    // Orders peer service base URL (customer email lookup for refunds).
    pub orders_base_url: String,
    // HMAC secret for inbound host JWTs.
    pub app_secret: String,
    // OAuth settings consumed by the install/settings UI only.
    pub oauth: OauthConfig,
    // Local-testing escape hatch: disables inbound auth entirely.
    pub skip_auth: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct PluginConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    database_url: Option<String>,
    canpost_base_url: Option<String>,
    canpost_username: Option<String>,
    canpost_password: Option<String>,
    canpost_customer_number: Option<String>,
    rate_snapshot_ttl_minutes: Option<u64>,
    label_storage_path: Option<String>,
    public_base_url: Option<String>,
    orders_base_url: Option<String>,
    app_secret: Option<String>,
}

pub const DEFAULT_LABEL_STORAGE_PATH: &str = "files/labels";
pub const DEFAULT_RATE_SNAPSHOT_TTL_MINUTES: u64 = 30;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl PluginConfig {
    pub fn from_env() -> Result<Self> {
        // Environment variables provide defaults for local development.
        let bind_addr = env_string("PORTAGE_BIND", "0.0.0.0:50051")
            .parse()
            .with_context(|| "parse PORTAGE_BIND")?;
        let metrics_bind = env_string("PORTAGE_METRICS_BIND", "0.0.0.0:9091")
            .parse()
            .with_context(|| "parse PORTAGE_METRICS_BIND")?;
        let rate_snapshot_ttl_minutes = match std::env::var("PORTAGE_RATE_SNAPSHOT_TTL_MINUTES") {
            Ok(value) => value
                .parse()
                .with_context(|| "parse PORTAGE_RATE_SNAPSHOT_TTL_MINUTES")?,
            Err(_) => DEFAULT_RATE_SNAPSHOT_TTL_MINUTES,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            database_url: std::env::var("PORTAGE_DATABASE_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok(),
            canpost_base_url: env_string(
                "PORTAGE_CANPOST_BASE_URL",
                "https://ct.soa-gw.canadapost.ca",
            ),
            canpost_username: env_string("PORTAGE_CANPOST_USERNAME", ""),
            canpost_password: env_string("PORTAGE_CANPOST_PASSWORD", ""),
            canpost_customer_number: env_string("PORTAGE_CANPOST_CUSTOMER_NUMBER", ""),
            rate_snapshot_ttl_minutes,
            label_storage_path: env_string("PORTAGE_LABEL_STORAGE_PATH", DEFAULT_LABEL_STORAGE_PATH),
            public_base_url: env_string("PORTAGE_PUBLIC_BASE_URL", "http://localhost:50050"),
            orders_base_url: env_string("PORTAGE_ORDERS_BASE_URL", ""),
            app_secret: env_string("PORTAGE_APP_SECRET", ""),
            oauth: OauthConfig {
                client_id: env_string("PORTAGE_OAUTH_CLIENT_ID", ""),
                client_secret: env_string("PORTAGE_OAUTH_CLIENT_SECRET", ""),
                authorize_url: env_string("PORTAGE_OAUTH_AUTHORIZE_URL", ""),
                token_url: env_string("PORTAGE_OAUTH_TOKEN_URL", ""),
                redirect_uri: env_string("PORTAGE_OAUTH_REDIRECT_URI", ""),
            },
            skip_auth: env_string("PORTAGE_SKIP_AUTH", "false") == "true",
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("PORTAGE_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read PORTAGE_CONFIG: {path}"))?;
            let override_cfg: PluginConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse plugin config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.database_url {
                config.database_url = Some(value);
            }
            if let Some(value) = override_cfg.canpost_base_url {
                config.canpost_base_url = value;
            }
            if let Some(value) = override_cfg.canpost_username {
                config.canpost_username = value;
            }
            if let Some(value) = override_cfg.canpost_password {
                config.canpost_password = value;
            }
            if let Some(value) = override_cfg.canpost_customer_number {
                config.canpost_customer_number = value;
            }
            if let Some(value) = override_cfg.rate_snapshot_ttl_minutes {
                config.rate_snapshot_ttl_minutes = value;
            }
            if let Some(value) = override_cfg.label_storage_path {
                config.label_storage_path = value;
            }
            if let Some(value) = override_cfg.public_base_url {
                config.public_base_url = value;
            }
            if let Some(value) = override_cfg.orders_base_url {
                config.orders_base_url = value;
            }
            if let Some(value) = override_cfg.app_secret {
                config.app_secret = value;
            }
        }
        Ok(config)
    }
}
