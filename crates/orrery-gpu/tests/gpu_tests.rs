//! Integration tests for orrery-gpu.

use std::sync::Arc;

use orrery_gpu::coordinator::BarrierCoordinator;
use orrery_gpu::sync::{GpuSync, HostSync, Residency, SyncStats};
use orrery_types::{DeviceId, OrreryError};

// ─── HostSync Tests ──────────────────────────────────────────

#[test]
fn host_starts_render_resident() {
    let sync = HostSync::new("host-0");
    assert_eq!(sync.residency(), Residency::Render);
    assert_eq!(sync.device_name(), Some("host-0"));
    assert_eq!(sync.stats(), SyncStats::default());
}

#[test]
fn host_transitions_alternate() {
    let sync = HostSync::default();
    sync.transition_to_compute().unwrap();
    assert_eq!(sync.residency(), Residency::Compute);
    sync.transition_to_render().unwrap();
    sync.wait_for_compute_complete().unwrap();
    assert_eq!(sync.residency(), Residency::Render);

    let stats = sync.stats();
    assert_eq!(stats.to_compute, 1);
    assert_eq!(stats.to_render, 1);
    assert_eq!(stats.waits, 1);
}

#[test]
fn host_rejects_double_transition() {
    let sync = HostSync::default();
    sync.transition_to_compute().unwrap();
    let err = sync.transition_to_compute().unwrap_err();
    assert!(matches!(err, OrreryError::Gpu(_)));
    assert!(sync.transition_to_render().is_ok());
    assert!(sync.transition_to_render().is_err());
}

// ─── Coordinator Tests ───────────────────────────────────────

#[test]
fn multi_device_needs_two_managers() {
    let coordinator = BarrierCoordinator::new();
    assert!(!coordinator.is_multi_device());

    coordinator.register_sync_manager(DeviceId(0), Arc::new(HostSync::new("d0")));
    assert!(!coordinator.is_multi_device());

    coordinator.register_sync_manager(DeviceId(1), Arc::new(HostSync::new("d1")));
    assert!(coordinator.is_multi_device());
    assert_eq!(coordinator.devices(), vec![DeviceId(0), DeviceId(1)]);
}

#[test]
fn registration_is_idempotent() {
    let coordinator = BarrierCoordinator::new();
    coordinator.register_sync_manager(DeviceId(0), Arc::new(HostSync::new("a")));
    coordinator.register_sync_manager(DeviceId(0), Arc::new(HostSync::new("b")));
    assert_eq!(coordinator.device_count(), 1);
    let manager = coordinator.device_manager(DeviceId(0)).unwrap();
    assert_eq!(manager.device_name(), Some("b"));

    assert!(coordinator.unregister(DeviceId(0)));
    assert!(!coordinator.unregister(DeviceId(0)));
}

#[test]
fn unknown_device_falls_back_to_default() {
    let default = Arc::new(HostSync::new("legacy"));
    let coordinator = BarrierCoordinator::with_default(default);
    assert_eq!(coordinator.manager_for(DeviceId(7)).device_name(), Some("legacy"));
    assert_eq!(coordinator.manager_for(DeviceId::AUTO).device_name(), Some("legacy"));
}

#[test]
fn auto_registration_replaces_default() {
    let coordinator = BarrierCoordinator::new();
    coordinator.register_sync_manager(DeviceId::AUTO, Arc::new(HostSync::new("replacement")));
    assert_eq!(coordinator.device_count(), 0);
    assert_eq!(coordinator.default_manager().device_name(), Some("replacement"));
}

#[test]
fn bracket_runs_full_protocol() {
    let sync = HostSync::default();
    let value = BarrierCoordinator::bracket(&sync, || {
        assert_eq!(sync.residency(), Residency::Compute);
        42
    })
    .unwrap();
    assert_eq!(value, 42);
    assert_eq!(sync.residency(), Residency::Render);
    assert_eq!(sync.stats().waits, 1);
}

#[test]
fn bracket_skips_dispatch_when_compute_transition_fails() {
    let sync = HostSync::default();
    sync.transition_to_compute().unwrap();

    let mut ran = false;
    let result = BarrierCoordinator::bracket(&sync, || ran = true);
    assert!(result.is_err());
    assert!(!ran);
}

#[test]
fn bracket_waits_even_when_render_transition_fails() {
    let sync = HostSync::default();

    // Flipping back inside the dispatch makes the closing transition fail.
    let result = BarrierCoordinator::bracket(&sync, || sync.transition_to_render().unwrap());
    assert!(result.is_err());
    assert_eq!(sync.stats().waits, 1);
    assert_eq!(sync.residency(), Residency::Render);
}
