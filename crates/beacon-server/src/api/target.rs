//! Target beacon API endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use beacon_core::Target;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the target router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_target).put(update_target))
}

/// Target beacon.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "target": { "name": "LibraryBeacon", "address": "AA:BB:CC:11:22:33" }
}))]
pub struct TargetResponse {
    /// The configured target, if any.
    #[schema(nullable)]
    pub target: Option<Target>,
}

/// Get the configured target beacon.
#[utoipa::path(
    get,
    path = "/api/target",
    tag = "target",
    operation_id = "getTarget",
    summary = "Get target beacon",
    responses(
        (status = 200, description = "Target retrieved", body = TargetResponse)
    )
)]
pub async fn get_target(State(state): State<SharedState>) -> Json<TargetResponse> {
    let target = state.detector().await.target().cloned();
    Json(TargetResponse { target })
}

/// Configure the target beacon.
#[utoipa::path(
    put,
    path = "/api/target",
    tag = "target",
    operation_id = "updateTarget",
    summary = "Set target beacon",
    description = "Sets the beacon to detect. A sighting matches when its name equals \
        `name` or its address equals `address` (exact, case-sensitive). Empty strings \
        count as unset, and at least one field must be set. Takes effect for the next \
        sighting, even during an active session, and is saved to the config file.",
    request_body = Target,
    responses(
        (status = 200, description = "Target updated", body = TargetResponse),
        (status = 400, description = "Neither name nor address set", body = ErrorResponse),
        (status = 500, description = "Config file could not be written", body = ErrorResponse)
    )
)]
pub async fn update_target(
    State(state): State<SharedState>,
    Json(request): Json<Target>,
) -> ApiResult<Json<TargetResponse>> {
    let applied = state.update_target(request).await?;
    info!(name = ?applied.name, address = ?applied.address, "Target beacon updated");

    Ok(Json(TargetResponse {
        target: Some(applied),
    }))
}
