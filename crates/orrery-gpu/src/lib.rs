//! # orrery-gpu
//!
//! GPU synchronization layer for the Orrery pipeline.
//!
//! Provides a [`GpuSync`] trait describing the resource-state barrier a
//! device needs around compute dispatch, a [`HostSync`] fallback that
//! performs the same bookkeeping on the CPU, and the
//! [`BarrierCoordinator`] that maps device ids to sync managers and
//! brackets dispatch with transitions and completion waits.
//!
//! The abstraction lets the scheduler treat one GPU, several GPUs, or
//! no GPU at all through the same code path.

pub mod coordinator;
pub mod sync;

pub use coordinator::BarrierCoordinator;
pub use sync::{GpuSync, HostSync, Residency, SyncStats};
