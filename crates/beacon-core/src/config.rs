//! Application configuration management.
//!
//! Configuration is layered:
//! 1. built-in defaults (the library demo beacon and its rules)
//! 2. a TOML file (`/etc/beacon/config.toml` on Linux, see [`default_config_path`])
//! 3. `BEACON_`-prefixed environment variables, with `__` between nested keys,
//!    e.g. `BEACON_TARGET__NAME=ReadingRoom` or `BEACON_SCAN__TIMEOUT_SECS=30`
//!
//! Within a `[target]` section a missing key is unset, and an empty string also
//! counts as unset. Omitting the section keeps the default target.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::target::Target;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "BEACON_CONFIG";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "BEACON";

/// Name of the demo beacon.
pub const DEFAULT_BEACON_NAME: &str = "LibraryBeacon";

/// Address of the demo beacon.
pub const DEFAULT_BEACON_ADDRESS: &str = "AA:BB:CC:11:22:33";

static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("MAC address regex is valid")
});

/// Errors from loading, saving and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    ReadError {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("Failed to write {path}: {source}")]
    WriteError {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The layered sources could not be merged or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] ::config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field failed validation.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Beacon to detect.
    #[serde(default = "default_target")]
    pub target: Target,

    /// Scan behaviour.
    pub scan: ScanConfig,

    /// Simulated detections (the emulator button of the demo).
    pub simulation: SimulationConfig,

    /// Rules shown when the beacon is detected.
    pub rules: RulesConfig,

    /// HTTP host settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Bluetooth adapter to use, e.g. `hci0`. The default adapter when unset.
    pub adapter: Option<String>,

    /// Stop a session that has not detected the beacon after this many seconds.
    pub timeout_secs: Option<u64>,

    /// Capacity of the sighting channel between the radio and the detector.
    pub channel_capacity: usize,
}

/// Simulation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Allow `POST /api/simulate` to show the rules without a detection.
    pub enabled: bool,
}

/// Text shown on detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Heading.
    pub title: String,
    /// Line shown before the list of rules.
    pub intro: String,
    /// The rules themselves.
    pub items: Vec<String>,
}

/// HTTP host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON logs to rolling files plus compact stdout instead of pretty stdout.
    pub production: bool,
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
    /// Where production log files go. `/var/log/beacon` on Linux when unset.
    pub directory: Option<PathBuf>,
}

fn default_target() -> Target {
    Target::new(DEFAULT_BEACON_NAME, DEFAULT_BEACON_ADDRESS)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: default_target(),
            scan: ScanConfig::default(),
            simulation: SimulationConfig::default(),
            rules: RulesConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            timeout_secs: None,
            channel_capacity: 64,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            title: "Welcome to the Library".to_string(),
            intro: "Please follow the rules:".to_string(),
            items: vec![
                "No food or drinks".to_string(),
                "Keep quiet".to_string(),
                "Silence your phone".to_string(),
                "Handle books with care".to_string(),
            ],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            production: false,
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Config {
    /// Load configuration from `path` plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, or a parse or
    /// validation error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::layered(path)
    }

    /// Like [`Config::load`], but a missing file yields defaults plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
        }
        Self::layered(path)
    }

    fn layered(path: &Path) -> ConfigResult<Self> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path` as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let write_error = |source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_error)?;
        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or
    /// [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, message: String| {
            errors.push(ConfigError::ValidationError {
                field: field.to_string(),
                message,
            });
        };

        if let Some(address) = self.target.address.as_deref().filter(|a| !a.is_empty()) {
            if !is_valid_mac_address(address) {
                invalid(
                    "target.address",
                    format!("'{address}' is not in XX:XX:XX:XX:XX:XX format"),
                );
            }
        }
        if self.scan.timeout_secs == Some(0) {
            invalid("scan.timeout_secs", "must be at least 1 when set".to_string());
        }
        if self.scan.channel_capacity == 0 {
            invalid("scan.channel_capacity", "must be at least 1".to_string());
        }
        if self.rules.items.is_empty() {
            invalid("rules.items", "at least one rule is required".to_string());
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            invalid(
                "server.bind",
                format!("'{}' is not a socket address", self.server.bind),
            );
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// The configured bind address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `server.bind` does not parse.
    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::ValidationError {
                field: "server.bind".to_string(),
                message: format!("'{}' is not a socket address", self.server.bind),
            })
    }
}

/// Returns `true` for `XX:XX:XX:XX:XX:XX` hex addresses (either case).
#[must_use]
pub fn is_valid_mac_address(address: &str) -> bool {
    MAC_ADDRESS_RE.is_match(address)
}

/// Location of the configuration file.
///
/// `BEACON_CONFIG` wins. Otherwise `/etc/beacon/config.toml` on Linux and the
/// platform config directory elsewhere.
#[must_use]
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/beacon/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "beacon").map_or_else(
            || PathBuf::from("config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target.name.as_deref(), Some(DEFAULT_BEACON_NAME));
        assert_eq!(config.target.address.as_deref(), Some(DEFAULT_BEACON_ADDRESS));
        assert_eq!(config.rules.items.len(), 4);
        assert!(!config.simulation.enabled);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(_))));
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.target, Config::default().target);
    }

    #[test]
    fn test_partial_target_section_unsets_other_field() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
[target]
address = "12:34:56:78:9A:BC"

[simulation]
enabled = true
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.target.name, None);
        assert_eq!(config.target.address.as_deref(), Some("12:34:56:78:9A:BC"));
        assert!(config.simulation.enabled);
        assert_eq!(config.rules, RulesConfig::default());
    }

    #[test]
    fn test_malformed_address_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[target]\naddress = \"not-a-mac\"\n");

        let err = Config::load(&path).unwrap_err();
        assert!(
            matches!(&err, ConfigError::ValidationError { field, .. } if field == "target.address")
        );
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.target = Target::by_address("AA-BB");
        config.scan.timeout_secs = Some(0);
        config.rules.items.clear();

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_unconfigured_target_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[target]\nname = \"\"\n");

        let config = Config::load(&path).unwrap();
        assert!(config.target.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.target = Target::by_name("ReadingRoom");
        config.scan.timeout_secs = Some(30);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.target, Target::by_name("ReadingRoom"));
        assert_eq!(loaded.scan.timeout_secs, Some(30));
    }

    #[test]
    fn test_is_valid_mac_address() {
        assert!(is_valid_mac_address("AA:BB:CC:11:22:33"));
        assert!(is_valid_mac_address("aa:bb:cc:11:22:33"));
        assert!(!is_valid_mac_address("AA:BB:CC:11:22"));
        assert!(!is_valid_mac_address("AA-BB-CC-11-22-33"));
        assert!(!is_valid_mac_address(""));
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
    }
}
