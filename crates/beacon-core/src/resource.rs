//! The scan resource capability.
//!
//! A [`ScanResource`] represents the radio: acquiring it starts a scan, releasing
//! it stops the scan. While a [`ScanHandle`] is held, the resource delivers
//! [`Sighting`](crate::types::Sighting)s over the channel it was built with.
//!
//! Backends:
//! - [`bluez`] - BlueZ discovery through `bluer` (feature `bluetooth`)
//! - [`mock`] - in-memory resource for tests and machines without Bluetooth

use std::fmt;

use futures::future::BoxFuture;
use thiserror::Error;

#[cfg(feature = "bluetooth")]
pub mod bluez;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub mod mock;

/// Why a scan could not be started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanUnavailable {
    /// No Bluetooth adapter was found.
    #[error("No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded.")]
    AdapterNotFound,

    /// The adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    AdapterPoweredOff,

    /// A scan is already running on this resource.
    #[error("A scan is already running on this adapter")]
    Busy,

    /// The Bluetooth stack reported an error.
    #[error("Bluetooth scan could not be started: {message}")]
    Backend {
        /// Error reported by the backend.
        message: String,
    },
}

/// Why stopping a scan failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseError {
    /// The handle does not belong to the scan currently running on this resource.
    #[error("Scan handle {0} does not belong to the running scan")]
    UnknownHandle(u64),

    /// The Bluetooth stack reported an error while stopping.
    #[error("Bluetooth scan could not be stopped cleanly: {message}")]
    Backend {
        /// Error reported by the backend.
        message: String,
    },
}

/// Proof that a scan is running.
///
/// A handle is exclusively owned and released exactly once through
/// [`ScanResource::release`]. If it is dropped instead, its guard runs and the
/// backend stops the scan on its own.
pub struct ScanHandle {
    id: u64,
    guard: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ScanHandle {
    /// Create a handle with no drop guard.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id, guard: None }
    }

    /// Create a handle that runs `guard` if it is dropped without being released.
    pub fn with_guard(id: u64, guard: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            guard: Some(Box::new(guard)),
        }
    }

    /// Backend-assigned identifier of this handle.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Disarm the drop guard. Backends call this once the scan is stopped.
    pub fn disarm(mut self) -> u64 {
        self.guard = None;
        self.id
    }
}

impl fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanHandle")
            .field("id", &self.id)
            .field("armed", &self.guard.is_some())
            .finish()
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            tracing::warn!(handle = self.id, "Scan handle dropped without release, stopping scan");
            guard();
        }
    }
}

/// An exclusively-owned radio scan that can be started and stopped.
pub trait ScanResource: Send + Sync {
    /// Short name of the backend, used in status output and logs.
    fn backend(&self) -> &'static str;

    /// Start scanning.
    ///
    /// # Errors
    ///
    /// Returns [`ScanUnavailable`] if the radio cannot be used right now.
    fn acquire(&self) -> BoxFuture<'_, Result<ScanHandle, ScanUnavailable>>;

    /// Stop the scan identified by `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError`] if the backend could not stop cleanly. The handle is
    /// consumed either way.
    fn release(&self, handle: ScanHandle) -> BoxFuture<'_, Result<(), ReleaseError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_guard_runs_on_drop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = ScanHandle::with_guard(7, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.id(), 7);
        drop(handle);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disarmed_guard_does_not_run() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = ScanHandle::with_guard(3, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.disarm(), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_debug_shows_armed_state() {
        let handle = ScanHandle::with_guard(1, || {});
        assert!(format!("{handle:?}").contains("armed: true"));
        let plain = ScanHandle::new(2);
        assert!(format!("{plain:?}").contains("armed: false"));
    }
}
