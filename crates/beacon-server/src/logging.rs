//! Tracing setup for the host.
//!
//! Two shapes, picked by `[logging] production`:
//! - **Production**: JSON lines to a daily-rolling file under the log directory,
//!   plus compact uncoloured stdout for the journal
//! - **Development**: pretty stdout with span open/close events

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use beacon_core::LoggingConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name prefix; the appender adds the date.
const LOG_FILE_PREFIX: &str = "beacon";

/// Non-blocking writers flush on drop, so their guards live for the whole process.
static WRITER_GUARDS: OnceLock<[WorkerGuard; 2]> = OnceLock::new();

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` wins over `config.level` when set.
///
/// # Errors
///
/// Returns an error if the filter does not parse, the log directory cannot be
/// created, or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(&config.level)?;

    if config.production {
        let dir = config.directory.clone().unwrap_or_else(default_log_directory);
        init_production(filter, &dir)
    } else {
        init_development(filter)
    }
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

fn file_writer(dir: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

fn init_production(filter: EnvFilter, dir: &Path) -> anyhow::Result<()> {
    let (file, file_guard) = file_writer(dir)?;
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(stdout)
                .with_ansi(false),
        )
        .try_init()?;

    let _ = WRITER_GUARDS.set([file_guard, stdout_guard]);
    tracing::info!(dir = %dir.display(), "File logging enabled");
    Ok(())
}

fn init_development(filter: EnvFilter) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
        )
        .try_init()?;
    Ok(())
}

fn default_log_directory() -> PathBuf {
    if cfg!(target_os = "linux") {
        PathBuf::from("/var/log/beacon")
    } else {
        directories::ProjectDirs::from("", "", "beacon")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_directory() {
        let dir = default_log_directory();
        assert!(dir.ends_with("logs") || dir == Path::new("/var/log/beacon"));
    }

    #[test]
    fn test_filter_from_level() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("beacon_core=trace,info").is_ok());
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("beacon");
        let (_writer, _guard) = file_writer(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
