//! Proximity-beacon detection sessions.
//!
//! [`BeaconDetector`] owns the scan lifecycle (`Idle` -> `Active` -> `Stopped` or
//! back to `Idle`), evaluates sightings against the configured [`Target`], and emits
//! a single [`Detection`] per session, stopping the scan when it does.
//!
//! The detector is single-writer: every operation takes `&mut self`, so hosts that
//! share it between tasks wrap it in a mutex.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::resource::{ReleaseError, ScanHandle, ScanResource, ScanUnavailable};
use crate::target::Target;
use crate::types::{Detection, ScanSession, SessionId, Sighting};

/// Errors returned by detector operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// The target is missing or has neither a name nor an address.
    #[error("Invalid beacon configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The scan resource could not be acquired.
    #[error(transparent)]
    ScanUnavailable(#[from] ScanUnavailable),

    /// The scan resource could not be released cleanly.
    #[error(transparent)]
    Release(#[from] ReleaseError),
}

/// Result type for detector operations.
pub type DetectorResult<T> = std::result::Result<T, DetectorError>;

/// What happened to a sighting passed to [`BeaconDetector::on_sighting`].
#[derive(Debug)]
pub enum SightingOutcome {
    /// No session was active, so the sighting was not evaluated.
    Ignored,

    /// The sighting was evaluated and is not the target.
    NoMatch,

    /// The sighting matched. The session is now stopped and the scan released.
    Detected {
        /// The detection event.
        detection: Detection,
        /// Outcome of releasing the scan resource.
        release: Result<(), ReleaseError>,
    },
}

impl SightingOutcome {
    /// The detection, if this sighting produced one.
    #[must_use]
    pub const fn detection(&self) -> Option<&Detection> {
        match self {
            Self::Detected { detection, .. } => Some(detection),
            _ => None,
        }
    }

    /// Returns `true` if this sighting produced a detection.
    #[must_use]
    pub const fn is_detection(&self) -> bool {
        matches!(self, Self::Detected { .. })
    }
}

/// Detects one configured beacon per scan session.
pub struct BeaconDetector {
    resource: Arc<dyn ScanResource>,
    target: Option<Target>,
    session: ScanSession,
    handle: Option<ScanHandle>,
}

impl BeaconDetector {
    /// Create an idle detector with no target.
    pub fn new(resource: Arc<dyn ScanResource>) -> Self {
        Self {
            resource,
            target: None,
            session: ScanSession::Idle,
            handle: None,
        }
    }

    /// Create an idle detector and configure `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidConfiguration`] if the target is empty.
    pub fn with_target(resource: Arc<dyn ScanResource>, target: Target) -> DetectorResult<Self> {
        let mut detector = Self::new(resource);
        detector.configure(target)?;
        Ok(detector)
    }

    /// Set the beacon to match against.
    ///
    /// Empty strings count as unset. A new target applies to the next sighting,
    /// including while a session is active. On error the previous target is kept.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidConfiguration`] if neither name nor address
    /// is set.
    pub fn configure(&mut self, target: Target) -> DetectorResult<()> {
        let target = target.normalized();
        if target.is_empty() {
            return Err(DetectorError::InvalidConfiguration {
                reason: "target needs a name or an address".to_string(),
            });
        }
        info!(name = ?target.name, address = ?target.address, "Beacon target configured");
        self.target = Some(target);
        Ok(())
    }

    /// The configured target.
    #[must_use]
    pub const fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// The current session state.
    #[must_use]
    pub const fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Name of the scan backend in use.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.resource.backend()
    }

    /// Start a scan session.
    ///
    /// Starting while a session is active returns that session unchanged.
    ///
    /// # Errors
    ///
    /// - [`DetectorError::InvalidConfiguration`] if no target is configured
    /// - [`DetectorError::ScanUnavailable`] if the scan resource cannot be acquired;
    ///   the session state is left as it was
    #[instrument(skip(self), fields(backend = self.resource.backend()))]
    pub async fn start(&mut self) -> DetectorResult<ScanSession> {
        if self.session.is_active() {
            debug!("Scan already active");
            return Ok(self.session.clone());
        }
        if self.target.is_none() {
            return Err(DetectorError::InvalidConfiguration {
                reason: "no beacon target configured".to_string(),
            });
        }

        let handle = self.resource.acquire().await?;
        let id = SessionId::new();
        info!(session = %id, handle = handle.id(), "Scanning for beacon");

        self.handle = Some(handle);
        self.session = ScanSession::Active {
            id,
            started_at: Utc::now(),
        };
        Ok(self.session.clone())
    }

    /// Evaluate one observed advertisement.
    ///
    /// The first matching sighting of an active session stops the session, releases
    /// the scan resource and is returned as a detection. Anything delivered while no
    /// session is active is ignored, and so is anything observed before the session
    /// started (advertisements still queued from an earlier session).
    pub async fn on_sighting(&mut self, sighting: Sighting) -> SightingOutcome {
        let ScanSession::Active { id, started_at } = self.session else {
            return SightingOutcome::Ignored;
        };
        if sighting.timestamp < started_at {
            debug!(
                session = %id,
                address = %sighting.device_address,
                "Dropping sighting observed before the session started"
            );
            return SightingOutcome::Ignored;
        }
        debug!(
            name = sighting.device_name.as_deref().unwrap_or("<unnamed>"),
            address = %sighting.device_address,
            "Found"
        );

        let Some(matched_by) = self.target.as_ref().and_then(|t| t.matches(&sighting)) else {
            return SightingOutcome::NoMatch;
        };

        let detection = Detection {
            session_id: id,
            sighting,
            matched_by,
            detected_at: Utc::now(),
        };
        self.session = ScanSession::Stopped {
            id,
            detection: detection.clone(),
        };
        info!(
            session = %id,
            address = %detection.sighting.device_address,
            matched_by = ?matched_by,
            "Beacon detected"
        );

        let release = self.release_handle().await;
        SightingOutcome::Detected { detection, release }
    }

    /// Cancel the active session.
    ///
    /// The session returns to `Idle` even if releasing the scan fails. Stopping an
    /// idle or stopped session does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Release`] if the scan resource could not be released.
    pub async fn stop(&mut self) -> DetectorResult<()> {
        let Some(id) = self.session.active_id() else {
            return Ok(());
        };
        self.session = ScanSession::Idle;
        info!(session = %id, "Scan stopped");
        self.release_handle().await.map_err(DetectorError::from)
    }

    async fn release_handle(&mut self) -> Result<(), ReleaseError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let result = self.resource.release(handle).await;
        if let Err(e) = &result {
            warn!(error = %e, "Scan resource release failed");
        }
        result
    }
}

impl std::fmt::Debug for BeaconDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeaconDetector")
            .field("backend", &self.resource.backend())
            .field("target", &self.target)
            .field("session", &self.session)
            .field("handle", &self.handle)
            .finish()
    }
}
