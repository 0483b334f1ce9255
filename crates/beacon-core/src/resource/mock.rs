//! In-memory scan resource.
//!
//! Used by tests and by hosts built without the `bluetooth` feature. Sightings are
//! pushed with [`MockScanResource::emit`] and arrive on the channel returned by
//! [`MockScanResource::new`], just like advertisements from a real adapter.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;

use super::{ReleaseError, ScanHandle, ScanResource, ScanUnavailable};
use crate::types::Sighting;

/// Default capacity of the sighting channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A scan resource that never touches a radio.
#[derive(Debug)]
pub struct MockScanResource {
    sightings: mpsc::Sender<Sighting>,
    state: Arc<Counters>,
    next_acquire_error: Mutex<Option<ScanUnavailable>>,
    next_release_error: Mutex<Option<ReleaseError>>,
}

#[derive(Debug, Default)]
struct Counters {
    // Id of the held handle, 0 when idle.
    held: AtomicU64,
    next_id: AtomicU64,
    acquired: AtomicUsize,
    released: AtomicUsize,
    guards_fired: AtomicUsize,
}

impl MockScanResource {
    /// Create a mock resource and the receiving end of its sighting channel.
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Arc<Self>, mpsc::Receiver<Sighting>) {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Same as [`MockScanResource::new`] with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Sighting>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let resource = Self {
            sightings: tx,
            state: Arc::new(Counters::default()),
            next_acquire_error: Mutex::new(None),
            next_release_error: Mutex::new(None),
        };
        (Arc::new(resource), rx)
    }

    /// Make the next [`ScanResource::acquire`] fail with `error`.
    pub fn fail_next_acquire(&self, error: ScanUnavailable) {
        *lock(&self.next_acquire_error) = Some(error);
    }

    /// Make the next [`ScanResource::release`] fail with `error`.
    pub fn fail_next_release(&self, error: ReleaseError) {
        *lock(&self.next_release_error) = Some(error);
    }

    /// Deliver a sighting as if the radio had observed it.
    ///
    /// Returns `false` if no scan is running or the receiver is gone.
    pub async fn emit(&self, sighting: Sighting) -> bool {
        if !self.is_held() {
            return false;
        }
        self.sightings.send(sighting).await.is_ok()
    }

    /// Whether a scan is currently running.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.state.held.load(Ordering::SeqCst) != 0
    }

    /// Number of successful acquisitions.
    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    /// Number of successful releases.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    /// Number of handles that were dropped without a successful release.
    #[must_use]
    pub fn guard_count(&self) -> usize {
        self.state.guards_fired.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl ScanResource for MockScanResource {
    fn backend(&self) -> &'static str {
        "mock"
    }

    fn acquire(&self) -> BoxFuture<'_, Result<ScanHandle, ScanUnavailable>> {
        async move {
            if let Some(error) = lock(&self.next_acquire_error).take() {
                return Err(error);
            }
            let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            if self
                .state
                .held
                .compare_exchange(0, id, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(ScanUnavailable::Busy);
            }
            self.state.acquired.fetch_add(1, Ordering::SeqCst);

            let state = Arc::clone(&self.state);
            Ok(ScanHandle::with_guard(id, move || {
                // Only the handle that holds the scan frees it.
                let _ = state
                    .held
                    .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst);
                state.guards_fired.fetch_add(1, Ordering::SeqCst);
            }))
        }
        .boxed()
    }

    fn release(&self, handle: ScanHandle) -> BoxFuture<'_, Result<(), ReleaseError>> {
        async move {
            // A failed release drops the handle still armed, so its guard stops the scan.
            if let Some(error) = lock(&self.next_release_error).take() {
                drop(handle);
                return Err(error);
            }
            let id = handle.id();
            if self
                .state
                .held
                .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(ReleaseError::UnknownHandle(id));
            }
            handle.disarm();
            self.state.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }
}
