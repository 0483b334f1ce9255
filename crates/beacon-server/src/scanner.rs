//! Scan orchestration around the detector.
//!
//! Feeds sightings from the scan backend into the detector, turns detections into
//! the rules view, and enforces the optional scan deadline.

use std::time::Duration;

use beacon_core::{DetectorResult, ReleaseError, ScanSession, SessionId, Sighting, SightingOutcome};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Spawn the task that delivers sightings to the detector.
///
/// The task ends when every sender of the channel is gone.
pub fn spawn_sighting_pump(
    state: SharedState,
    mut sightings: mpsc::Receiver<Sighting>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(sighting) = sightings.recv().await {
            handle_sighting(&state, sighting).await;
        }
        debug!("Sighting channel closed");
    })
}

/// Deliver one sighting and surface a detection, if any.
pub async fn handle_sighting(state: &SharedState, sighting: Sighting) -> bool {
    let outcome = state.detector().await.on_sighting(sighting).await;
    let SightingOutcome::Detected { detection, release } = outcome else {
        return false;
    };
    if let Err(e) = release {
        warn!(error = %e, "Beacon detected but the scan did not stop cleanly");
    }
    info!(
        session = %detection.session_id,
        address = %detection.sighting.device_address,
        "Showing library rules"
    );
    state.show_rules(Some(detection)).await;
    true
}

/// Start a scan session, arming the deadline for a newly started one.
///
/// # Errors
///
/// Returns the detector error unchanged.
pub async fn start_scan(state: &SharedState) -> DetectorResult<ScanSession> {
    let (session, newly_started) = {
        let mut detector = state.detector().await;
        let was_active = detector.session().is_active();
        let session = detector.start().await?;
        (session, !was_active)
    };

    if newly_started {
        let timeout = state.config().await.scan.timeout_secs;
        if let (Some(secs), Some(id)) = (timeout, session.active_id()) {
            spawn_deadline(state.clone(), id, Duration::from_secs(secs));
        }
    }
    Ok(session)
}

/// Stop the active session.
///
/// The session is always left idle; a failed release is returned alongside it.
pub async fn stop_scan(state: &SharedState) -> (ScanSession, Option<ReleaseError>) {
    let mut detector = state.detector().await;
    let release_error = match detector.stop().await {
        Ok(()) => None,
        Err(beacon_core::DetectorError::Release(e)) => {
            warn!(error = %e, "Scan stopped but the resource was not released cleanly");
            Some(e)
        }
        Err(e) => {
            // stop only fails on release
            warn!(error = %e, "Unexpected error while stopping scan");
            None
        }
    };
    (detector.session().clone(), release_error)
}

fn spawn_deadline(state: SharedState, id: SessionId, after: Duration) -> JoinHandle<()> {
    debug!(session = %id, secs = after.as_secs(), "Scan deadline armed");
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let mut detector = state.detector().await;
        if detector.session().active_id() != Some(id) {
            return;
        }
        info!(session = %id, "Scan deadline reached without detection");
        if let Err(e) = detector.stop().await {
            warn!(error = %e, "Scan deadline stop did not release cleanly");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use beacon_core::{Config, MockScanResource, ScanUnavailable};
    use std::sync::Arc;

    fn state_with(config: Config) -> (SharedState, Arc<MockScanResource>, mpsc::Receiver<Sighting>) {
        let (mock, rx) = MockScanResource::new();
        let state = AppState::new(config, None, mock.clone()).unwrap();
        (state, mock, rx)
    }

    #[tokio::test]
    async fn test_detection_shows_rules() {
        let (state, _mock, _rx) = state_with(Config::default());
        start_scan(&state).await.unwrap();

        let miss = Sighting::new(Some("Phone".into()), "01:02:03:04:05:06");
        assert!(!handle_sighting(&state, miss).await);
        assert!(!state.rules_view().await.visible);

        let hit = Sighting::new(Some("LibraryBeacon".into()), "01:02:03:04:05:07");
        assert!(handle_sighting(&state, hit).await);

        let view = state.rules_view().await;
        assert!(view.visible);
        assert!(!view.simulated);
        assert_eq!(
            view.last_detection.unwrap().sighting.device_address,
            "01:02:03:04:05:07"
        );
    }

    #[tokio::test]
    async fn test_pump_delivers_from_channel() {
        let (state, mock, rx) = state_with(Config::default());
        let pump = spawn_sighting_pump(state.clone(), rx);
        start_scan(&state).await.unwrap();

        assert!(mock.emit(Sighting::new(None, "AA:BB:CC:11:22:33")).await);
        for _ in 0..100 {
            if state.rules_view().await.visible {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.rules_view().await.visible);
        assert!(!mock.is_held());
        pump.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_session() {
        let mut config = Config::default();
        config.scan.timeout_secs = Some(30);
        let (state, mock, _rx) = state_with(config);

        start_scan(&state).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(state.detector().await.session(), &ScanSession::Idle);
        assert!(!mock.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ignores_later_session() {
        let mut config = Config::default();
        config.scan.timeout_secs = Some(30);
        let (state, mock, _rx) = state_with(config);

        start_scan(&state).await.unwrap();
        stop_scan(&state).await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        let second = start_scan(&state).await.unwrap().active_id();

        // First deadline fires at 30s and must leave the second session alone.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(state.detector().await.session().active_id(), second);
        assert!(mock.is_held());
    }

    #[tokio::test]
    async fn test_sighting_queued_in_previous_session_is_ignored() {
        let (state, mock, mut rx) = state_with(Config::default());
        start_scan(&state).await.unwrap();
        assert!(mock.emit(Sighting::new(Some("LibraryBeacon".into()), "01:02:03:04:05:07")).await);
        stop_scan(&state).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = start_scan(&state).await.unwrap().active_id();

        let queued = rx.recv().await.unwrap();
        assert!(!handle_sighting(&state, queued).await);
        assert_eq!(state.detector().await.session().active_id(), second);
        assert!(!state.rules_view().await.visible);
    }

    #[tokio::test]
    async fn test_stop_reports_release_error() {
        let (state, mock, _rx) = state_with(Config::default());
        start_scan(&state).await.unwrap();
        mock.fail_next_release(ReleaseError::UnknownHandle(1));

        let (session, release_error) = stop_scan(&state).await;
        assert_eq!(session, ScanSession::Idle);
        assert_eq!(release_error, Some(ReleaseError::UnknownHandle(1)));
    }

    #[tokio::test]
    async fn test_start_failure_is_returned() {
        let (state, mock, _rx) = state_with(Config::default());
        mock.fail_next_acquire(ScanUnavailable::AdapterPoweredOff);
        assert!(start_scan(&state).await.is_err());
        assert_eq!(state.detector().await.session(), &ScanSession::Idle);
    }
}
