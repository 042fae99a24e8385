//! Pipeline defaults and format constants.

/// Default simulation timestep (seconds). 1/60th of a second.
pub const DEFAULT_DT: f64 = 1.0 / 60.0;

/// Raw device id meaning "no preference, use the legacy default manager".
pub const AUTO_DEVICE: i32 = -1;

/// Number of device-specific sync managers needed before GPU members
/// are dispatched concurrently per device.
pub const MULTI_DEVICE_THRESHOLD: usize = 2;

/// Snapshot format version written by the snapshot manager.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Worker count used when the host cannot report its parallelism.
pub const FALLBACK_PARALLELISM: usize = 4;
