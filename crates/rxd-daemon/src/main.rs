//! rxd-daemon entry point.
//!
//! Loads config, connects and migrates the database, wires middleware and
//! starts the HTTP server. Route handlers live in `routes.rs`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use rxd_config::{AppConfig, UnusedKeyPolicy};
use rxd_daemon::{routes, state};
use rxd_db::PgStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = rxd_config::load_from_env()?;
    let report = rxd_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &report.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }
    let cfg = AppConfig::from_loaded(&loaded)?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let secrets = rxd_config::resolve_secrets(&cfg);
    let pool = rxd_db::connect(secrets.require_database_url()?, cfg.database.max_connections)
        .await
        .context("database connect failed")?;
    rxd_db::migrate(&pool).await?;

    let addr: SocketAddr = cfg
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid server.bind_addr '{}'", cfg.server.bind_addr))?;
    let cors = cors_from_config(&cfg);

    let shared = Arc::new(state::AppState::new(Arc::new(PgStore::new(pool)), cfg));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    info!("rxd-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only the configured origins. Unparseable entries are skipped.
fn cors_from_config(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .server
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid cors origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
