//! BlueZ scan resource (Linux only, via `bluer`).
//!
//! Acquiring starts an LE discovery on the selected adapter and spawns a task that
//! forwards every advertisement as a [`Sighting`]. Dropping the discovery stream is
//! what stops discovery in BlueZ, so releasing (or dropping) the handle aborts that
//! task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bluer::{AdapterEvent, DiscoveryFilter, DiscoveryTransport};
use futures::future::{BoxFuture, FutureExt};
use futures::{pin_mut, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ReleaseError, ScanHandle, ScanResource, ScanUnavailable};
use crate::types::Sighting;

/// Scan resource backed by a BlueZ adapter.
#[derive(Debug)]
pub struct BluezScanResource {
    adapter_name: Option<String>,
    sightings: mpsc::Sender<Sighting>,
    running: Arc<Mutex<Option<RunningScan>>>,
    next_id: AtomicU64,
}

#[derive(Debug)]
struct RunningScan {
    id: u64,
    task: JoinHandle<()>,
}

impl BluezScanResource {
    /// Create a resource for `adapter_name` (or the default adapter when `None`).
    ///
    /// Sightings are delivered on the returned receiver while a scan is running.
    #[must_use]
    pub fn new(
        adapter_name: Option<String>,
        channel_capacity: usize,
    ) -> (Self, mpsc::Receiver<Sighting>) {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let resource = Self {
            adapter_name,
            sightings: tx,
            running: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        };
        (resource, rx)
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningScan>> {
        lock(&self.running)
    }

    async fn open_adapter(&self) -> Result<bluer::Adapter, ScanUnavailable> {
        let session = bluer::Session::new().await.map_err(backend_error)?;
        let adapter = match &self.adapter_name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| {
            debug!(error = %e, "Adapter lookup failed");
            ScanUnavailable::AdapterNotFound
        })?;

        if !adapter.is_powered().await.map_err(backend_error)? {
            return Err(ScanUnavailable::AdapterPoweredOff);
        }
        Ok(adapter)
    }

    async fn start_discovery(&self) -> Result<ScanHandle, ScanUnavailable> {
        if self.running().is_some() {
            return Err(ScanUnavailable::Busy);
        }

        let adapter = self.open_adapter().await?;
        let mut filter = DiscoveryFilter::default();
        filter.transport = DiscoveryTransport::Le;
        filter.duplicate_data = true;
        adapter
            .set_discovery_filter(filter)
            .await
            .map_err(backend_error)?;
        let events = adapter
            .discover_devices_with_changes()
            .await
            .map_err(backend_error)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sightings = self.sightings.clone();
        let adapter_name = adapter.name().to_string();
        let task = tokio::spawn(async move {
            pin_mut!(events);
            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                let device_name = match adapter.device(address) {
                    Ok(device) => device.name().await.unwrap_or_default(),
                    Err(_) => None,
                };
                if sightings
                    .send(Sighting::new(device_name, address.to_string()))
                    .await
                    .is_err()
                {
                    debug!("Sighting receiver closed, ending discovery");
                    break;
                }
            }
        });

        let mut running = self.running();
        if running.is_some() {
            // Lost a race with a concurrent acquire.
            task.abort();
            return Err(ScanUnavailable::Busy);
        }
        *running = Some(RunningScan { id, task });
        drop(running);

        info!(adapter = %adapter_name, handle = id, "LE discovery started");
        Ok(guarded_handle(Arc::clone(&self.running), id))
    }

    async fn stop_discovery(&self, handle: ScanHandle) -> Result<(), ReleaseError> {
        let id = handle.id();
        let scan = {
            let mut running = self.running();
            if running.as_ref().is_some_and(|scan| scan.id == id) {
                running.take()
            } else {
                None
            }
        };
        let Some(scan) = scan else {
            return Err(ReleaseError::UnknownHandle(id));
        };

        handle.disarm();
        scan.task.abort();
        match scan.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                warn!(error = %e, handle = id, "Discovery task failed");
                return Err(ReleaseError::Backend {
                    message: e.to_string(),
                });
            }
        }
        info!(handle = id, "LE discovery stopped");
        Ok(())
    }
}

fn lock(running: &Mutex<Option<RunningScan>>) -> MutexGuard<'_, Option<RunningScan>> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A handle whose guard aborts the discovery task and frees the resource for the
/// next acquisition, as long as the running scan is still the one it started.
fn guarded_handle(running: Arc<Mutex<Option<RunningScan>>>, id: u64) -> ScanHandle {
    ScanHandle::with_guard(id, move || {
        let mut running = lock(&running);
        if running.as_ref().is_some_and(|scan| scan.id == id) {
            if let Some(scan) = running.take() {
                scan.task.abort();
            }
        }
    })
}

fn backend_error(e: bluer::Error) -> ScanUnavailable {
    ScanUnavailable::Backend {
        message: e.to_string(),
    }
}

impl ScanResource for BluezScanResource {
    fn backend(&self) -> &'static str {
        "bluez"
    }

    fn acquire(&self) -> BoxFuture<'_, Result<ScanHandle, ScanUnavailable>> {
        self.start_discovery().boxed()
    }

    fn release(&self, handle: ScanHandle) -> BoxFuture<'_, Result<(), ReleaseError>> {
        self.stop_discovery(handle).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_scan(id: u64) -> RunningScan {
        RunningScan {
            id,
            task: tokio::spawn(std::future::pending::<()>()),
        }
    }

    #[tokio::test]
    async fn test_dropped_handle_frees_running_scan() {
        let (resource, _rx) = BluezScanResource::new(None, 8);
        *resource.running() = Some(running_scan(1));

        drop(guarded_handle(Arc::clone(&resource.running), 1));
        assert!(resource.running().is_none());
    }

    #[tokio::test]
    async fn test_stale_guard_leaves_newer_scan_alone() {
        let (resource, _rx) = BluezScanResource::new(None, 8);
        *resource.running() = Some(running_scan(2));

        drop(guarded_handle(Arc::clone(&resource.running), 1));
        assert_eq!(resource.running().as_ref().map(|scan| scan.id), Some(2));
    }

    #[tokio::test]
    async fn test_release_of_unknown_handle_keeps_resource_usable() {
        let (resource, _rx) = BluezScanResource::new(None, 8);
        *resource.running() = Some(running_scan(3));

        let foreign = guarded_handle(Arc::clone(&resource.running), 9);
        assert_eq!(
            resource.release(foreign).await,
            Err(ReleaseError::UnknownHandle(9))
        );
        assert_eq!(resource.running().as_ref().map(|scan| scan.id), Some(3));

        let own = guarded_handle(Arc::clone(&resource.running), 3);
        assert_eq!(resource.release(own).await, Ok(()));
        assert!(resource.running().is_none());
    }
}
