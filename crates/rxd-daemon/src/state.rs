//! Shared runtime state for rxd-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum.

use std::sync::Arc;

use rxd_config::AppConfig;
use rxd_service::Store;
use serde::{Deserialize, Serialize};

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "rxd-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    /// Persistence backend (Postgres in production, in-memory in tests).
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self {
            store,
            config,
            build: BuildInfo::default(),
        }
    }
}
