//! Rules API endpoints.
//!
//! The rules are shown when the target beacon is detected, or on demand when
//! simulation is enabled, and stay visible until acknowledged.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_core::Detection;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the rules router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_rules))
        .route("/acknowledge", post(acknowledge_rules))
}

/// Creates the simulation router, mounted beside `/rules`.
pub fn simulate_router() -> Router<SharedState> {
    Router::new().route("/simulate", post(simulate_detection))
}

/// Rules and whether they are currently shown.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "title": "Welcome to the Library",
    "intro": "Please follow the rules:",
    "items": ["No food or drinks", "Keep quiet", "Silence your phone", "Handle books with care"],
    "visible": true,
    "simulated": false,
    "last_detection": null
}))]
pub struct RulesResponse {
    /// Heading.
    pub title: String,

    /// Line shown before the rules.
    pub intro: String,

    /// The rules.
    pub items: Vec<String>,

    /// Whether the rules are being shown.
    pub visible: bool,

    /// Whether they were opened by a simulation.
    pub simulated: bool,

    /// Most recent detection.
    #[schema(nullable)]
    pub last_detection: Option<Detection>,
}

async fn rules_response(state: &SharedState) -> RulesResponse {
    let rules = state.config().await.rules.clone();
    let view = state.rules_view().await;
    RulesResponse {
        title: rules.title,
        intro: rules.intro,
        items: rules.items,
        visible: view.visible,
        simulated: view.simulated,
        last_detection: view.last_detection,
    }
}

/// Get the rules.
#[utoipa::path(
    get,
    path = "/api/rules",
    tag = "rules",
    operation_id = "getRules",
    summary = "Get rules",
    description = "Returns the rules text and whether it is currently shown. The rules \
        become visible when the target beacon is detected.",
    responses(
        (status = 200, description = "Rules retrieved", body = RulesResponse)
    )
)]
pub async fn get_rules(State(state): State<SharedState>) -> Json<RulesResponse> {
    Json(rules_response(&state).await)
}

/// Acknowledge the rules.
#[utoipa::path(
    post,
    path = "/api/rules/acknowledge",
    tag = "rules",
    operation_id = "acknowledgeRules",
    summary = "Acknowledge rules",
    description = "Hides the rules. The last detection is kept.",
    responses(
        (status = 200, description = "Rules hidden", body = RulesResponse)
    )
)]
pub async fn acknowledge_rules(State(state): State<SharedState>) -> Json<RulesResponse> {
    state.acknowledge_rules().await;
    Json(rules_response(&state).await)
}

/// Show the rules as if the beacon was detected.
#[utoipa::path(
    post,
    path = "/api/simulate",
    tag = "rules",
    operation_id = "simulateDetection",
    summary = "Simulate a detection",
    description = "Shows the rules without a radio detection. The detector session is \
        not touched. Only available when `simulation.enabled` is set.",
    responses(
        (status = 200, description = "Rules shown", body = RulesResponse),
        (status = 404, description = "Simulation disabled", body = ErrorResponse)
    )
)]
pub async fn simulate_detection(State(state): State<SharedState>) -> ApiResult<Json<RulesResponse>> {
    if !state.config().await.simulation.enabled {
        return Err(ApiError::NotFound {
            error_code: "simulation_disabled".to_string(),
            message: "Simulation is disabled in the configuration".to_string(),
        });
    }

    info!("Simulated beacon detection");
    state.show_rules(None).await;
    Ok(Json(rules_response(&state).await))
}
