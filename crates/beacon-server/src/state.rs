//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use beacon_core::{
    BeaconDetector, BeaconError, Config, Detection, DetectorError, ScanResource, Target,
};
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::{info, warn};

/// Shared application state handle.
pub type SharedState = Arc<AppState>;

/// What the rules view currently shows.
#[derive(Debug, Clone, Default)]
pub struct RulesView {
    /// Whether the rules are being shown.
    pub visible: bool,
    /// Whether they were opened by a simulation rather than a detection.
    pub simulated: bool,
    /// Most recent detection, kept after the rules are acknowledged.
    pub last_detection: Option<Detection>,
}

/// Application state.
pub struct AppState {
    config: RwLock<Config>,
    config_path: Option<PathBuf>,
    detector: Mutex<BeaconDetector>,
    rules_view: RwLock<RulesView>,
    started_at: Instant,
}

impl AppState {
    /// Build the state and configure the detector from `config.target`.
    ///
    /// An empty target leaves the detector unconfigured. When `config_path` is
    /// set, target updates are written back to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the detector rejects the configured target.
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        resource: Arc<dyn ScanResource>,
    ) -> Result<SharedState, BeaconError> {
        let detector = if config.target.is_empty() {
            warn!("No target beacon configured, scanning is unavailable until one is set");
            BeaconDetector::new(resource)
        } else {
            BeaconDetector::with_target(resource, config.target.clone())?
        };
        info!(backend = detector.backend(), "Detector ready");

        Ok(Arc::new(Self {
            config: RwLock::new(config),
            config_path,
            detector: Mutex::new(detector),
            rules_view: RwLock::new(RulesView::default()),
            started_at: Instant::now(),
        }))
    }

    /// Read access to the configuration.
    pub async fn config(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read().await
    }

    /// Exclusive access to the detector.
    ///
    /// All detector operations go through this lock, which keeps the detector
    /// single-writer.
    pub async fn detector(&self) -> MutexGuard<'_, BeaconDetector> {
        self.detector.lock().await
    }

    /// Snapshot of the rules view.
    pub async fn rules_view(&self) -> RulesView {
        self.rules_view.read().await.clone()
    }

    /// Show the rules, either for a detection or as a simulation.
    pub async fn show_rules(&self, detection: Option<Detection>) {
        let mut view = self.rules_view.write().await;
        view.visible = true;
        view.simulated = detection.is_none();
        if detection.is_some() {
            view.last_detection = detection;
        }
    }

    /// Hide the rules.
    pub async fn acknowledge_rules(&self) {
        let mut view = self.rules_view.write().await;
        view.visible = false;
        view.simulated = false;
    }

    /// Reconfigure the detector and persist the new target.
    ///
    /// The target is checked against the same rules as the config file, then the
    /// detector is updated, so an invalid target changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::InvalidConfiguration`] for an empty target or a
    /// malformed address, or a persistence error if the config file cannot be
    /// written.
    pub async fn update_target(&self, target: Target) -> Result<Target, BeaconError> {
        let target = target.normalized();
        let mut candidate = self.config.read().await.clone();
        candidate.target = target.clone();
        candidate
            .validate()
            .map_err(|e| BeaconError::InvalidConfiguration(e.to_string()))?;

        let applied = {
            let mut detector = self.detector().await;
            detector.configure(target).map_err(BeaconError::from)?;
            detector.target().cloned().ok_or_else(|| {
                BeaconError::from(DetectorError::InvalidConfiguration {
                    reason: "target was not stored".to_string(),
                })
            })?
        };

        let mut config = self.config.write().await;
        config.target = applied.clone();
        if let Some(path) = &self.config_path {
            config.save(path)?;
        }
        Ok(applied)
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{MockScanResource, Sighting};

    fn state() -> SharedState {
        let (mock, _rx) = MockScanResource::new();
        AppState::new(Config::default(), None, mock).unwrap()
    }

    #[tokio::test]
    async fn test_detector_configured_from_config() {
        let state = state();
        let detector = state.detector().await;
        assert_eq!(detector.target(), Some(&Config::default().target));
    }

    #[tokio::test]
    async fn test_empty_target_leaves_detector_unconfigured() {
        let (mock, _rx) = MockScanResource::new();
        let mut config = Config::default();
        config.target = Target::default();
        let state = AppState::new(config, None, mock).unwrap();
        assert!(state.detector().await.target().is_none());
    }

    #[tokio::test]
    async fn test_rules_view_transitions() {
        let state = state();
        assert!(!state.rules_view().await.visible);

        state.show_rules(None).await;
        let view = state.rules_view().await;
        assert!(view.visible && view.simulated);
        assert!(view.last_detection.is_none());

        state.acknowledge_rules().await;
        assert!(!state.rules_view().await.visible);
    }

    #[tokio::test]
    async fn test_update_target_rejects_empty() {
        let state = state();
        let err = state.update_target(Target::default()).await.unwrap_err();
        assert!(matches!(err, BeaconError::InvalidConfiguration(_)));
        assert_eq!(state.config().await.target, Config::default().target);
    }

    #[tokio::test]
    async fn test_update_target_rejects_malformed_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let (mock, _rx) = MockScanResource::new();
        let state = AppState::new(Config::default(), Some(path.clone()), mock).unwrap();

        let err = state
            .update_target(Target::by_address("not-a-mac"))
            .await
            .unwrap_err();
        assert!(matches!(err, BeaconError::InvalidConfiguration(ref m) if m.contains("target.address")));

        assert!(!path.exists());
        assert_eq!(state.config().await.target, Config::default().target);
        assert_eq!(
            state.detector().await.target(),
            Some(&Config::default().target)
        );
    }

    #[tokio::test]
    async fn test_update_target_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let (mock, _rx) = MockScanResource::new();
        let state = AppState::new(Config::default(), Some(path.clone()), mock).unwrap();

        let applied = state
            .update_target(Target {
                name: Some("ReadingRoom".into()),
                address: Some(String::new()),
            })
            .await
            .unwrap();
        assert_eq!(applied, Target::by_name("ReadingRoom"));

        let saved = Config::load(&path).unwrap();
        assert_eq!(saved.target, Target::by_name("ReadingRoom"));

        let detector = state.detector().await;
        let seen = Sighting::new(Some("ReadingRoom".into()), "00:00:00:00:00:09");
        assert!(detector.target().unwrap().matches(&seen).is_some());
    }
}
