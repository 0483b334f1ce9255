//! Scan session API endpoints.
//!
//! Start, stop and inspect the detection session of the host's detector.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_core::{DetectorError, ScanSession};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::scanner;
use crate::state::SharedState;

/// Creates the scan router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_scan))
        .route("/start", post(start_scan))
        .route("/stop", post(stop_scan))
}

// ============================================================================
// Response Types
// ============================================================================

/// Current scan session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "session": {
        "state": "active",
        "id": "01928f6e-3b1c-7c4a-9d2e-5f6a7b8c9d0e",
        "started_at": "2025-01-15T09:30:00Z"
    },
    "backend": "bluez"
}))]
pub struct ScanStatusResponse {
    /// Session state.
    pub session: ScanSession,

    /// Scan backend in use.
    #[schema(example = "bluez")]
    pub backend: String,
}

/// Result of stopping a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "session": { "state": "idle" },
    "release_error": null
}))]
pub struct StopScanResponse {
    /// Session state after stopping (always idle).
    pub session: ScanSession,

    /// Why the scan did not stop cleanly, if it did not.
    #[schema(nullable)]
    pub release_error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get the current scan session.
#[utoipa::path(
    get,
    path = "/api/scan",
    tag = "scan",
    operation_id = "getScan",
    summary = "Get scan session",
    description = "Returns the detector's session: `idle`, `active` while scanning, \
        or `stopped` with the detection that ended it.",
    responses(
        (status = 200, description = "Session retrieved", body = ScanStatusResponse)
    )
)]
pub async fn get_scan(State(state): State<SharedState>) -> Json<ScanStatusResponse> {
    let detector = state.detector().await;
    Json(ScanStatusResponse {
        session: detector.session().clone(),
        backend: detector.backend().to_string(),
    })
}

/// Start scanning for the target beacon.
#[utoipa::path(
    post,
    path = "/api/scan/start",
    tag = "scan",
    operation_id = "startScan",
    summary = "Start scanning",
    description = "Acquires the radio and starts a detection session. Starting while a \
        session is active returns that session unchanged. The first advertisement \
        matching the target stops the session and shows the rules.",
    responses(
        (status = 200, description = "Session active", body = ScanStatusResponse),
        (status = 424, description = "No target beacon configured", body = ErrorResponse),
        (status = 503, description = "Radio scan unavailable", body = ErrorResponse)
    )
)]
pub async fn start_scan(State(state): State<SharedState>) -> ApiResult<Json<ScanStatusResponse>> {
    let session = scanner::start_scan(&state).await.map_err(|e| match e {
        DetectorError::InvalidConfiguration { reason } => ApiError::FailedDependency {
            error_code: "target_not_configured".to_string(),
            message: "Configure a target beacon before starting a scan".to_string(),
            details: Some(reason),
        },
        other => ApiError::from(other),
    })?;
    let backend = state.detector().await.backend().to_string();

    Ok(Json(ScanStatusResponse { session, backend }))
}

/// Stop the active session.
#[utoipa::path(
    post,
    path = "/api/scan/stop",
    tag = "scan",
    operation_id = "stopScan",
    summary = "Stop scanning",
    description = "Stops an active session without a detection. Always leaves the \
        session idle; if the radio did not stop cleanly the reason is reported in \
        `release_error`. Stopping an idle or stopped session does nothing.",
    responses(
        (status = 200, description = "Session idle", body = StopScanResponse)
    )
)]
pub async fn stop_scan(State(state): State<SharedState>) -> Json<StopScanResponse> {
    let (session, release_error) = scanner::stop_scan(&state).await;
    Json(StopScanResponse {
        session,
        release_error: release_error.map(|e| e.to_string()),
    })
}
