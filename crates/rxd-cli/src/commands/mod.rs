//! Command handler modules for the `rxd` CLI.

pub mod stock;
pub mod user;

use std::sync::Arc;

use anyhow::Result;
use rxd_db::PgStore;

/// Store over the database named by `RXD_DATABASE_URL`.
pub async fn store_from_env() -> Result<Arc<PgStore>> {
    let pool = rxd_db::connect_from_env().await?;
    Ok(Arc::new(PgStore::new(pool)))
}
