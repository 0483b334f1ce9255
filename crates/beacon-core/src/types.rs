//! Shared types and OpenAPI schemas.
//!
//! Sightings come in from a scan backend, detections go out to the host, and
//! [`ScanSession`] is the lifecycle state of one detector.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One observed advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "device_name": "LibraryBeacon",
    "device_address": "AA:BB:CC:11:22:33",
    "timestamp": "2025-01-15T03:30:00Z"
}))]
pub struct Sighting {
    /// Advertised device name, if the device broadcasts one.
    #[schema(example = "LibraryBeacon")]
    pub device_name: Option<String>,

    /// Bluetooth MAC address of the advertiser.
    #[schema(example = "AA:BB:CC:11:22:33")]
    pub device_address: String,

    /// When the advertisement was observed (UTC).
    pub timestamp: DateTime<Utc>,
}

impl Sighting {
    /// Create a sighting observed now.
    pub fn new(device_name: Option<String>, device_address: impl Into<String>) -> Self {
        Self::observed_at(device_name, device_address, Utc::now())
    }

    /// Create a sighting observed at `timestamp`.
    pub fn observed_at(
        device_name: Option<String>,
        device_address: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device_name,
            device_address: device_address.into(),
            timestamp,
        }
    }
}

/// Which target field(s) a sighting matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    /// The advertised name equals the target name.
    Name,
    /// The advertiser address equals the target address.
    Address,
    /// Both fields matched.
    NameAndAddress,
}

/// Identifier of one scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a new, time-ordered session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The detection event emitted on the first matching sighting of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Detection {
    /// Session that produced this detection.
    pub session_id: SessionId,

    /// The sighting that matched.
    pub sighting: Sighting,

    /// Which target field(s) matched.
    pub matched_by: MatchedBy,

    /// When the detector processed the match (UTC).
    pub detected_at: DateTime<Utc>,
}

/// Lifecycle state of a detector's scan session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanSession {
    /// No scan is running.
    #[default]
    Idle,

    /// A scan is running and sightings are being evaluated.
    Active {
        /// Session identifier.
        id: SessionId,
        /// When the scan resource was acquired (UTC).
        started_at: DateTime<Utc>,
    },

    /// The session ended on its first matching sighting.
    Stopped {
        /// Session identifier.
        id: SessionId,
        /// The retained first detection.
        detection: Detection,
    },
}

impl ScanSession {
    /// Returns `true` while a scan is running.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Id of the running session, if any.
    #[must_use]
    pub const fn active_id(&self) -> Option<SessionId> {
        match self {
            Self::Active { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// The retained detection of a stopped session.
    #[must_use]
    pub const fn detection(&self) -> Option<&Detection> {
        match self {
            Self::Stopped { detection, .. } => Some(detection),
            _ => None,
        }
    }

    /// Lowercase state name as used on the wire.
    #[must_use]
    pub const fn state_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active { .. } => "active",
            Self::Stopped { .. } => "stopped",
        }
    }
}
