//! System API endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the system router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/status", get(get_status))
}

/// System status response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "version": "0.1.0",
    "uptime_secs": 3600,
    "backend": "bluez",
    "simulation_enabled": false,
    "scan_timeout_secs": 120
}))]
pub struct SystemStatusResponse {
    /// Server version.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Server uptime in seconds.
    #[schema(example = 3600)]
    pub uptime_secs: u64,

    /// Scan backend in use (`bluez` or `mock`).
    #[schema(example = "bluez")]
    pub backend: String,

    /// Whether `POST /api/simulate` is available.
    pub simulation_enabled: bool,

    /// Scan deadline, if configured.
    #[schema(nullable)]
    pub scan_timeout_secs: Option<u64>,
}

/// Get system status.
#[utoipa::path(
    get,
    path = "/api/system/status",
    tag = "system",
    operation_id = "getSystemStatus",
    summary = "Get system status",
    description = "Returns version, uptime and how the host is configured to scan.",
    responses(
        (status = 200, description = "System status retrieved", body = SystemStatusResponse)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<SystemStatusResponse> {
    let backend = state.detector().await.backend().to_string();
    let config = state.config().await;

    Json(SystemStatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        backend,
        simulation_enabled: config.simulation.enabled,
        scan_timeout_secs: config.scan.timeout_secs,
    })
}
