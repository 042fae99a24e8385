//! GPU sync-manager trait and host fallback.
//!
//! The [`GpuSync`] trait defines the barrier protocol a device needs
//! around compute dispatch. The [`HostSync`] implementation performs the
//! same state transitions on the CPU, serving as the legacy default
//! manager and as a reference for correctness.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use orrery_types::{OrreryError, OrreryResult};

/// Which side of the compute/render boundary shared buffers are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Buffers are writable by compute kernels.
    Compute,
    /// Buffers are readable by the renderer.
    Render,
}

/// Trait for per-device synchronization managers.
///
/// The scheduler brackets every batch of GPU modules with these calls:
///
/// ```text
/// sync.transition_to_compute()?;
/// for module in batch { module.execute_step(..) }
/// sync.transition_to_render()?;
/// sync.wait_for_compute_complete()?;
/// ```
///
/// Synchronization inside one device's buffers is the implementation's
/// own responsibility; the scheduler never touches buffers directly.
///
/// # Implementations
/// - [`HostSync`]: CPU bookkeeping fallback (always available)
pub trait GpuSync: Send + Sync {
    /// Make shared buffers compute-writable.
    fn transition_to_compute(&self) -> OrreryResult<()>;

    /// Make shared buffers render-readable.
    fn transition_to_render(&self) -> OrreryResult<()>;

    /// Block until all dispatched device work has retired.
    fn wait_for_compute_complete(&self) -> OrreryResult<()>;

    /// Human-readable device name, if known.
    fn device_name(&self) -> Option<&str> {
        None
    }
}

/// Counters describing how often a sync manager was driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Calls to `transition_to_compute`.
    pub to_compute: u64,
    /// Calls to `transition_to_render`.
    pub to_render: u64,
    /// Calls to `wait_for_compute_complete`.
    pub waits: u64,
}

/// Host-side sync manager.
///
/// Used for:
/// - Machines without a GPU attached
/// - The legacy default manager for modules with no device preference
/// - Validating bracket discipline (transitions must alternate)
pub struct HostSync {
    name: String,
    residency: Mutex<Residency>,
    to_compute: AtomicU64,
    to_render: AtomicU64,
    waits: AtomicU64,
}

impl HostSync {
    /// Creates a host sync manager; buffers start render-resident.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            residency: Mutex::new(Residency::Render),
            to_compute: AtomicU64::new(0),
            to_render: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        }
    }

    /// Current residency of the shared buffers.
    pub fn residency(&self) -> Residency {
        *self.residency.lock()
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            to_compute: self.to_compute.load(Ordering::Acquire),
            to_render: self.to_render.load(Ordering::Acquire),
            waits: self.waits.load(Ordering::Acquire),
        }
    }
}

impl Default for HostSync {
    fn default() -> Self {
        Self::new("host")
    }
}

impl GpuSync for HostSync {
    fn transition_to_compute(&self) -> OrreryResult<()> {
        let mut residency = self.residency.lock();
        if *residency == Residency::Compute {
            return Err(OrreryError::Gpu(format!(
                "{}: buffers already compute-resident",
                self.name
            )));
        }
        *residency = Residency::Compute;
        self.to_compute.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn transition_to_render(&self) -> OrreryResult<()> {
        let mut residency = self.residency.lock();
        if *residency == Residency::Render {
            return Err(OrreryError::Gpu(format!(
                "{}: buffers already render-resident",
                self.name
            )));
        }
        *residency = Residency::Render;
        self.to_render.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn wait_for_compute_complete(&self) -> OrreryResult<()> {
        // Host work is synchronous; nothing is ever in flight.
        self.waits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn device_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}
