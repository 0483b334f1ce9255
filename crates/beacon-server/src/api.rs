//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `scan` - Starting, stopping and inspecting the detection session
//! - `target` - The beacon being searched for
//! - `rules` - Rules shown on detection, acknowledgement and simulation
//! - `health` - Service health checks
//! - `system` - Host status
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod openapi;
pub mod rules;
pub mod scan;
pub mod system;
pub mod target;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /scan              - Session status, start, stop
/// ├── /target            - Target beacon
/// ├── /rules             - Rules view and acknowledgement
/// ├── /simulate          - Show the rules without a detection
/// ├── /system            - Host status
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/scan", scan::router())
                .nest("/target", target::router())
                .nest("/rules", rules::router())
                .merge(rules::simulate_router())
                .nest("/system", system::router()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
