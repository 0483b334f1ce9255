//! # beacon-core
//!
//! Core logic for detecting a configured BLE beacon.
//!
//! This crate provides:
//! - A detection session state machine driven by advertisement sightings
//! - The scan resource capability, with BlueZ and in-memory backends
//! - Configuration management (target beacon, scan, rules, host settings)
//!
//! ## Architecture
//!
//! - [`detector`] - `BeaconDetector`: start, match, stop
//! - [`target`] - the beacon being searched for and its match rule
//! - [`resource`] - acquiring and releasing the radio scan
//! - [`config`] - configuration loading, saving, and validation
//! - [`error`] - unified error types for the crate
//! - [`types`] - sightings, detections, sessions and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod detector;
pub mod error;
pub mod resource;
pub mod target;
pub mod types;

// Re-export primary types for convenience
pub use config::{
    default_config_path, is_valid_mac_address, Config, ConfigError, ConfigResult, LoggingConfig,
    RulesConfig, ScanConfig, ServerConfig, SimulationConfig,
};
pub use detector::{BeaconDetector, DetectorError, DetectorResult, SightingOutcome};
pub use error::{BeaconError, Result};
#[cfg(feature = "bluetooth")]
pub use resource::bluez::BluezScanResource;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use resource::mock::MockScanResource;
pub use resource::{ReleaseError, ScanHandle, ScanResource, ScanUnavailable};
pub use target::Target;
pub use types::{Detection, MatchedBy, ScanSession, SessionId, Sighting};
