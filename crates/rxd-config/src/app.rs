use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::LoadedConfig;

/// Typed view of the merged configuration. Every field has a default, so an
/// empty config is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stock: StockConfig,
    pub orders: OrdersConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Browser origins allowed by CORS (the single-page front end).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// NAME of the env var holding the Postgres URL (never the URL itself).
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: "RXD_DATABASE_URL".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    /// Reorder level given to products created without one.
    pub default_reorder_level: i64,
    /// When false, approving an order whose lines exceed current stock is
    /// refused; when true the deduction clips at zero and is logged.
    pub allow_approval_shortfall: bool,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            default_reorder_level: 10,
            allow_approval_shortfall: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    pub number_prefix: String,
    pub max_items: usize,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            number_prefix: "ORD".to_string(),
            max_items: 100,
        }
    }
}

impl AppConfig {
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: AppConfig = serde_json::from_value(loaded.config_json.clone())
            .context("config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url_env.trim().is_empty() {
            bail!("CONFIG_INVALID: database.url_env must name an env var");
        }
        if self.database.max_connections == 0 {
            bail!("CONFIG_INVALID: database.max_connections must be > 0");
        }
        if self.stock.default_reorder_level < 0 {
            bail!("CONFIG_INVALID: stock.default_reorder_level must be >= 0");
        }
        if self.orders.number_prefix.trim().is_empty() {
            bail!("CONFIG_INVALID: orders.number_prefix must not be empty");
        }
        if self.orders.max_items == 0 {
            bail!("CONFIG_INVALID: orders.max_items must be > 0");
        }
        Ok(())
    }
}
