//! Floodlight API Server
//!
//! Run with: cargo run --bin floodlight
//!
//! # Configuration
//!
//! Read from `FLOODLIGHT_CONFIG`, `~/.config/floodlight/config.toml`,
//! `/etc/floodlight/config.toml` or `./floodlight.toml`, whichever exists
//! first. Environment variables override the file:
//! - `FLOODLIGHT_BACKEND_URL`: Metric store URL(s), comma separated
//! - `FLOODLIGHT_TENANT`: Tenant id
//! - `FLOODLIGHT_AUTH_TOKEN`: Static auth token (optional)
//! - `FLOODLIGHT_API_HOST` / `FLOODLIGHT_API_PORT`: Listen address
//! - `FLOODLIGHT_LOG_LEVEL` / `FLOODLIGHT_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Full filter, takes precedence over the log level

use anyhow::Context;
use floodlight::api::{serve, AppState};
use floodlight::backend::HttpMetricStore;
use floodlight::config::Config;
use floodlight::logging;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    logging::init(&config.logging)?;

    tracing::info!("Starting Floodlight API server v{}", env!("CARGO_PKG_VERSION"));

    let store_config = config
        .backend
        .store_config()
        .context("invalid backend configuration")?;
    tracing::info!(
        "Metric store: {} (tenant {})",
        store_config.base_url,
        store_config.tenant
    );

    let store = HttpMetricStore::new(store_config, config.backend.token_provider())
        .context("failed to build metric store client")?;
    let settings = config
        .engine_settings()
        .context("invalid engine configuration")?;

    let state = AppState::new(Arc::new(store), settings, config.api.clone());
    tracing::info!("Path mode: {}", state.mode());

    serve(state, &config.api).await?;

    tracing::info!("Floodlight API server stopped");
    Ok(())
}
