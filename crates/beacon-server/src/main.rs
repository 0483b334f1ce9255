//! # beacon-server
//!
//! HTTP host for beacon detection.
//!
//! This binary provides:
//! - A detection session driven by BLE advertisements (BlueZ with the
//!   `bluetooth` feature, an in-memory backend otherwise)
//! - REST API for scanning, the target beacon and the rules view
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development, in-memory scan backend
//! cargo run --package beacon-server
//!
//! # On a host with BlueZ
//! cargo run --package beacon-server --features bluetooth
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;

use anyhow::Context;
use beacon_core::{default_config_path, Config, ScanResource, Sighting};
use beacon_server::state::AppState;
use beacon_server::{api, logging, scanner};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = default_config_path();
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    logging::init(&config.logging)?;
    info!(config = %config_path.display(), "Starting beacon-server");

    let addr = config.bind_addr()?;
    let (resource, sightings) = scan_resource(&config);

    let state = AppState::new(config, Some(config_path), resource)?;
    let pump = scanner::spawn_sighting_pump(state.clone(), sightings);

    let app = api::create_router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let (_, release_error) = scanner::stop_scan(&state).await;
    if let Some(e) = release_error {
        warn!(error = %e, "Scan did not stop cleanly on shutdown");
    }
    pump.abort();

    info!("beacon-server stopped");
    Ok(())
}

#[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
fn scan_resource(config: &Config) -> (Arc<dyn ScanResource>, mpsc::Receiver<Sighting>) {
    let (resource, rx) = beacon_core::BluezScanResource::new(
        config.scan.adapter.clone(),
        config.scan.channel_capacity,
    );
    (Arc::new(resource), rx)
}

#[cfg(not(all(feature = "bluetooth", not(feature = "mock-bluetooth"))))]
fn scan_resource(config: &Config) -> (Arc<dyn ScanResource>, mpsc::Receiver<Sighting>) {
    warn!("Built without the bluetooth feature, using the in-memory scan backend");
    let (resource, rx) = beacon_core::MockScanResource::with_capacity(config.scan.channel_capacity);
    let resource: Arc<dyn ScanResource> = resource;
    (resource, rx)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
