//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only env var NAMES (e.g. `database.url_env`).
//! - Callers invoke [`resolve_secrets`] once at startup and pass the result
//!   into constructors; `std::env::var` is not scattered across crates.
//! - `Debug` redacts values. Error messages name the env var, never the value.

use anyhow::{bail, Result};

use crate::AppConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Postgres connection URL. `None` if the named env var was absent or empty.
    pub database_url: Option<String>,
    /// The env var the URL was read from, for error messages.
    pub database_url_env: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .field("database_url_env", &self.database_url_env)
            .finish()
    }
}

impl ResolvedSecrets {
    /// The database URL, or an error naming the env var that should hold it.
    pub fn require_database_url(&self) -> Result<&str> {
        match self.database_url.as_deref() {
            Some(url) => Ok(url),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
                self.database_url_env
            ),
        }
    }
}

/// Returns `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn resolve_secrets(cfg: &AppConfig) -> ResolvedSecrets {
    let var = cfg.database.url_env.trim().to_string();
    ResolvedSecrets {
        database_url: resolve_env(&var),
        database_url_env: var,
    }
}
