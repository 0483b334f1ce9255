//! End-to-end detection through the sighting channel, the way a host drives it.

#![cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]

use std::sync::Arc;
use std::time::Duration;

use beacon_core::{
    BeaconDetector, MatchedBy, MockScanResource, ScanSession, Sighting, SightingOutcome, Target,
};
use tokio::sync::{mpsc, Mutex};
use tokio_test::{assert_err, assert_ok};

/// Drain the channel into the detector until a detection arrives.
async fn pump(
    detector: Arc<Mutex<BeaconDetector>>,
    mut sightings: mpsc::Receiver<Sighting>,
) -> Option<beacon_core::Detection> {
    while let Some(sighting) = sightings.recv().await {
        if let SightingOutcome::Detected { detection, release } =
            detector.lock().await.on_sighting(sighting).await
        {
            assert_ok!(release);
            return Some(detection);
        }
    }
    None
}

#[tokio::test]
async fn test_detection_through_channel() {
    let (mock, rx) = MockScanResource::new();
    let detector = Arc::new(Mutex::new(assert_ok!(BeaconDetector::with_target(
        mock.clone(),
        Target::new("LibraryBeacon", "AA:BB:CC:11:22:33"),
    ))));

    assert_ok!(detector.lock().await.start().await);
    let pump = tokio::spawn(pump(Arc::clone(&detector), rx));

    assert!(mock.emit(Sighting::new(Some("Speaker".into()), "01:02:03:04:05:06")).await);
    assert!(mock.emit(Sighting::new(None, "AA:BB:CC:11:22:33")).await);

    let detection = tokio::time::timeout(Duration::from_secs(5), pump)
        .await
        .expect("pump finished")
        .expect("pump did not panic")
        .expect("beacon detected");

    assert_eq!(detection.matched_by, MatchedBy::Address);
    assert_eq!(detection.sighting.device_address, "AA:BB:CC:11:22:33");

    let guard = detector.lock().await;
    assert!(matches!(guard.session(), ScanSession::Stopped { .. }));
    assert!(!mock.is_held());
    assert_eq!(mock.release_count(), 1);
}

#[tokio::test]
async fn test_no_sightings_delivered_after_detection() {
    let (mock, _rx) = MockScanResource::new();
    let mut detector = assert_ok!(BeaconDetector::with_target(
        mock.clone(),
        Target::by_name("LibraryBeacon"),
    ));

    assert_ok!(detector.start().await);
    let outcome = detector
        .on_sighting(Sighting::new(Some("LibraryBeacon".into()), "00:00:00:00:00:01"))
        .await;
    assert!(outcome.is_detection());

    // The radio is released, so the backend has nothing to deliver.
    assert!(!mock.emit(Sighting::new(Some("LibraryBeacon".into()), "00:00:00:00:00:02")).await);
}

#[tokio::test]
async fn test_queued_sighting_does_not_end_next_session() {
    let (mock, mut rx) = MockScanResource::new();
    let mut detector = assert_ok!(BeaconDetector::with_target(
        mock.clone(),
        Target::by_name("LibraryBeacon"),
    ));

    // Session 1 sees the beacon, but the sighting stays queued.
    assert_ok!(detector.start().await);
    assert!(mock.emit(Sighting::new(Some("LibraryBeacon".into()), "00:00:00:00:00:01")).await);
    assert_ok!(detector.stop().await);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = assert_ok!(detector.start().await).active_id();

    let queued = rx.recv().await.expect("queued sighting");
    let outcome = detector.on_sighting(queued).await;
    assert!(matches!(outcome, SightingOutcome::Ignored));
    assert_eq!(detector.session().active_id(), second);
    assert!(mock.is_held());

    // A fresh advertisement still ends the new session.
    assert!(mock.emit(Sighting::new(Some("LibraryBeacon".into()), "00:00:00:00:00:01")).await);
    let fresh = rx.recv().await.expect("fresh sighting");
    let detection = detector.on_sighting(fresh).await;
    assert_eq!(detection.detection().map(|d| d.session_id), second);
}

#[tokio::test]
async fn test_empty_target_is_rejected() {
    let (mock, _rx) = MockScanResource::new();
    assert_err!(BeaconDetector::with_target(mock, Target::default()));
}
