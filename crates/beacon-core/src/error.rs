//! Unified error types for the beacon core library.
//!
//! Each module has its own error type ([`DetectorError`], [`ScanUnavailable`],
//! [`ReleaseError`], [`ConfigError`]). [`BeaconError`] folds them into one type
//! with classification helpers, HTTP status codes and machine-readable codes for
//! hosts that expose the detector over an API.
//!
//! # Example
//!
//! ```rust
//! use beacon_core::error::{BeaconError, Result};
//!
//! fn require_target(name: Option<&str>) -> Result<&str> {
//!     name.ok_or_else(|| BeaconError::InvalidConfiguration("no target".into()))
//! }
//! ```
//!
//! [`DetectorError`]: crate::detector::DetectorError
//! [`ScanUnavailable`]: crate::resource::ScanUnavailable
//! [`ReleaseError`]: crate::resource::ReleaseError
//! [`ConfigError`]: crate::config::ConfigError

use std::path::PathBuf;
use thiserror::Error;

use crate::resource::ScanUnavailable;

/// The unified error type for all beacon operations.
#[derive(Debug, Error)]
pub enum BeaconError {
    // =========================================================================
    // DETECTION ERRORS
    // =========================================================================
    /// The beacon target is missing or empty.
    #[error("Invalid beacon configuration: {0}")]
    InvalidConfiguration(String),

    /// The scan resource could not be acquired.
    #[error(transparent)]
    ScanUnavailable(ScanUnavailable),

    /// The scan resource could not be released cleanly.
    #[error("Failed to stop scan: {0}")]
    ReleaseFailed(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// Reading or writing a file failed.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for beacon operations.
pub type Result<T> = std::result::Result<T, BeaconError>;

impl BeaconError {
    /// Returns `true` if this error comes from the detector or the scan resource.
    #[inline]
    #[must_use]
    pub const fn is_detector_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::ScanUnavailable(_) | Self::ReleaseFailed(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if retrying the same operation later may succeed.
    ///
    /// A powered-off adapter or a busy radio can come back; a missing adapter or a
    /// bad configuration needs someone to act first.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ScanUnavailable(
                ScanUnavailable::AdapterPoweredOff
                    | ScanUnavailable::Busy
                    | ScanUnavailable::Backend { .. }
            ) | Self::ReleaseFailed(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidConfiguration(_) => 400,

            // 404 Not Found
            Self::ConfigNotFound(_) => 404,

            // 422 Unprocessable Entity - semantic errors
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error - server-side issues
            Self::ReleaseFailed(_) | Self::PersistenceError(_) | Self::IoError(_) => 500,

            // 503 Service Unavailable - Bluetooth hardware issues
            Self::ScanUnavailable(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::ScanUnavailable(ScanUnavailable::AdapterNotFound) => {
                "BLUETOOTH_ADAPTER_NOT_FOUND"
            }
            Self::ScanUnavailable(ScanUnavailable::AdapterPoweredOff) => {
                "BLUETOOTH_ADAPTER_POWERED_OFF"
            }
            Self::ScanUnavailable(ScanUnavailable::Busy) => "SCAN_BUSY",
            Self::ScanUnavailable(ScanUnavailable::Backend { .. }) => "SCAN_UNAVAILABLE",
            Self::ReleaseFailed(_) => "SCAN_RELEASE_FAILED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::detector::DetectorError> for BeaconError {
    fn from(err: crate::detector::DetectorError) -> Self {
        use crate::detector::DetectorError;
        match err {
            DetectorError::InvalidConfiguration { reason } => Self::InvalidConfiguration(reason),
            DetectorError::ScanUnavailable(e) => Self::ScanUnavailable(e),
            DetectorError::Release(e) => Self::ReleaseFailed(e.to_string()),
        }
    }
}

impl From<ScanUnavailable> for BeaconError {
    fn from(err: ScanUnavailable) -> Self {
        Self::ScanUnavailable(err)
    }
}

impl From<crate::resource::ReleaseError> for BeaconError {
    fn from(err: crate::resource::ReleaseError) -> Self {
        Self::ReleaseFailed(err.to_string())
    }
}

impl From<crate::config::ConfigError> for BeaconError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path.into()),
            ConfigError::ReadError { path, source } => {
                Self::PersistenceError(format!("Failed to read {path}: {source}"))
            }
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {path}: {source}"))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::detector::DetectorError;
    use crate::resource::ReleaseError;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_detector_error_classification() {
        assert!(BeaconError::InvalidConfiguration("empty".into()).is_detector_error());
        assert!(BeaconError::ScanUnavailable(ScanUnavailable::Busy).is_detector_error());
        assert!(BeaconError::ReleaseFailed("dbus".into()).is_detector_error());

        assert!(!BeaconError::ConfigParseError("bad".into()).is_detector_error());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(BeaconError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(BeaconError::ConfigParseError("syntax error".into()).is_config_error());
        assert!(BeaconError::ConfigValidationError("invalid value".into()).is_config_error());

        assert!(!BeaconError::InvalidConfiguration("empty".into()).is_config_error());
    }

    #[test]
    fn test_io_error_classification() {
        assert!(BeaconError::PersistenceError("disk full".into()).is_io_error());
        assert!(BeaconError::IoError(IoErr::new(ErrorKind::NotFound, "test")).is_io_error());
        assert!(!BeaconError::ReleaseFailed("x".into()).is_io_error());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(BeaconError::ScanUnavailable(ScanUnavailable::AdapterPoweredOff).is_recoverable());
        assert!(BeaconError::ScanUnavailable(ScanUnavailable::Busy).is_recoverable());
        assert!(!BeaconError::ScanUnavailable(ScanUnavailable::AdapterNotFound).is_recoverable());
        assert!(!BeaconError::InvalidConfiguration("empty".into()).is_recoverable());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            BeaconError::InvalidConfiguration("empty".into()).http_status_code(),
            400
        );
        assert_eq!(
            BeaconError::ConfigNotFound(PathBuf::new()).http_status_code(),
            404
        );
        assert_eq!(
            BeaconError::ConfigValidationError("bad".into()).http_status_code(),
            422
        );
        assert_eq!(BeaconError::ReleaseFailed("x".into()).http_status_code(), 500);
        assert_eq!(
            BeaconError::ScanUnavailable(ScanUnavailable::AdapterNotFound).http_status_code(),
            503
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BeaconError::ScanUnavailable(ScanUnavailable::AdapterPoweredOff).error_code(),
            "BLUETOOTH_ADAPTER_POWERED_OFF"
        );
        assert_eq!(
            BeaconError::InvalidConfiguration("empty".into()).error_code(),
            "INVALID_CONFIGURATION"
        );
    }

    #[test]
    fn test_from_detector_error() {
        let err: BeaconError = DetectorError::ScanUnavailable(ScanUnavailable::Busy).into();
        assert!(matches!(err, BeaconError::ScanUnavailable(ScanUnavailable::Busy)));

        let err: BeaconError = DetectorError::Release(ReleaseError::UnknownHandle(4)).into();
        assert!(matches!(err, BeaconError::ReleaseFailed(ref m) if m.contains('4')));
    }

    #[test]
    fn test_from_config_error() {
        let err: BeaconError = ConfigError::MultipleValidationErrors(vec![
            ConfigError::ValidationError {
                field: "target".into(),
                message: "empty".into(),
            },
            ConfigError::ValidationError {
                field: "rules.items".into(),
                message: "empty".into(),
            },
        ])
        .into();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("target: empty; rules.items: empty"));
    }

    #[test]
    fn test_error_display_messages() {
        let err = BeaconError::ScanUnavailable(ScanUnavailable::AdapterNotFound);
        assert!(err.to_string().contains("No Bluetooth adapter found"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BeaconError>();
        assert_sync::<BeaconError>();
    }
}
