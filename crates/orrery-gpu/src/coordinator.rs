//! GPU barrier coordination.
//!
//! The coordinator owns the `device → sync manager` map plus one legacy
//! default manager used for modules without a device preference. It
//! brackets a dispatch closure with the barrier protocol of
//! [`GpuSync`].
//!
//! Registering or unregistering managers while a frame is executing is
//! not supported; the map is read once per GPU batch and a concurrent
//! change may be observed half-way through a frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use orrery_types::constants::MULTI_DEVICE_THRESHOLD;
use orrery_types::{DeviceId, OrreryResult};

use crate::sync::{GpuSync, HostSync};

/// Maps compute devices to their sync managers.
pub struct BarrierCoordinator {
    devices: RwLock<BTreeMap<DeviceId, Arc<dyn GpuSync>>>,
    default: RwLock<Arc<dyn GpuSync>>,
}

impl BarrierCoordinator {
    /// Creates a coordinator whose legacy default is a [`HostSync`].
    pub fn new() -> Self {
        Self::with_default(Arc::new(HostSync::default()))
    }

    /// Creates a coordinator with an explicit legacy default manager.
    pub fn with_default(default: Arc<dyn GpuSync>) -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            default: RwLock::new(default),
        }
    }

    /// Registers (or replaces) the manager for `device`.
    ///
    /// Registering under [`DeviceId::AUTO`] replaces the legacy default.
    pub fn register_sync_manager(&self, device: DeviceId, manager: Arc<dyn GpuSync>) {
        if device.is_auto() {
            self.set_default(manager);
            return;
        }
        let count = {
            let mut devices = self.devices.write();
            devices.insert(device, manager);
            devices.len()
        };
        tracing::debug!(%device, devices = count, "registered GPU sync manager");
    }

    /// Removes the manager for `device`. Returns whether one was present.
    pub fn unregister(&self, device: DeviceId) -> bool {
        let removed = self.devices.write().remove(&device).is_some();
        if removed {
            tracing::debug!(%device, "unregistered GPU sync manager");
        }
        removed
    }

    /// Replaces the legacy default manager.
    pub fn set_default(&self, manager: Arc<dyn GpuSync>) {
        *self.default.write() = manager;
    }

    /// Returns the legacy default manager.
    pub fn default_manager(&self) -> Arc<dyn GpuSync> {
        Arc::clone(&*self.default.read())
    }

    /// Returns the device-specific manager, if one is registered.
    pub fn device_manager(&self, device: DeviceId) -> Option<Arc<dyn GpuSync>> {
        self.devices.read().get(&device).cloned()
    }

    /// Returns the device manager, falling back to the legacy default.
    pub fn manager_for(&self, device: DeviceId) -> Arc<dyn GpuSync> {
        self.device_manager(device)
            .unwrap_or_else(|| self.default_manager())
    }

    /// Number of device-specific managers.
    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Registered device ids in ascending order.
    pub fn devices(&self) -> Vec<DeviceId> {
        self.devices.read().keys().copied().collect()
    }

    /// True once enough device-specific managers exist for per-device
    /// concurrent dispatch.
    pub fn is_multi_device(&self) -> bool {
        self.device_count() >= MULTI_DEVICE_THRESHOLD
    }

    /// Runs `dispatch` inside the barrier protocol of `manager`.
    ///
    /// The closure's value is returned only if every barrier call
    /// succeeded. A failing `transition_to_compute` skips the dispatch.
    /// Once dispatch ran, the wait is issued even if `transition_to_render`
    /// failed; the first barrier error wins.
    pub fn bracket<T>(
        manager: &dyn GpuSync,
        dispatch: impl FnOnce() -> T,
    ) -> OrreryResult<T> {
        manager.transition_to_compute()?;
        let out = dispatch();
        let rendered = manager.transition_to_render();
        let waited = manager.wait_for_compute_complete();
        rendered.and(waited)?;
        Ok(out)
    }
}

impl Default for BarrierCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
