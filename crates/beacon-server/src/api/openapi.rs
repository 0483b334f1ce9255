//! OpenAPI specification generation for the beacon API.
//!
//! The document is served at `/api/openapi.json` and written to the workspace
//! root by the `gen-openapi` binary for client generation.

use axum::Json;
use beacon_core::{Detection, MatchedBy, ScanSession, SessionId, Sighting, Target};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::rules::RulesResponse;
use super::scan::{ScanStatusResponse, StopScanResponse};
use super::system::SystemStatusResponse;
use super::target::TargetResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> serde_json::Result<String> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for beacon.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "beacon API",
        version = "0.1.0",
        description = r#"
# beacon API

beacon watches for one BLE beacon and shows a set of rules when it is found.

## Flow

1. **Configure** the target beacon by name and/or address (`PUT /api/target`).
2. **Start** a scan session (`POST /api/scan/start`). The radio scans until the first
   advertisement matching the target, then stops by itself.
3. **Read** the rules (`GET /api/rules`), which are now visible, and **acknowledge**
   them (`POST /api/rules/acknowledge`).

A session can be stopped early with `POST /api/scan/stop`, and the host stops it after
`scan.timeout_secs` when configured.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local beacon server")
    ),
    tags(
        (name = "system", description = "Health checks and system status"),
        (name = "scan", description = "Detection session lifecycle"),
        (name = "target", description = "The beacon being searched for"),
        (name = "rules", description = "Rules shown on detection")
    ),
    paths(
        super::health::health_check,
        super::scan::get_scan,
        super::scan::start_scan,
        super::scan::stop_scan,
        super::target::get_target,
        super::target::update_target,
        super::rules::get_rules,
        super::rules::acknowledge_rules,
        super::rules::simulate_detection,
        super::system::get_status,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            ScanStatusResponse,
            StopScanResponse,
            TargetResponse,
            RulesResponse,
            SystemStatusResponse,
            Target,
            Sighting,
            Detection,
            MatchedBy,
            SessionId,
            ScanSession,
        )
    )
)]
pub struct ApiDoc;
