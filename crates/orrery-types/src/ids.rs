//! Strongly-typed identifiers.
//!
//! A newtype around the raw device index keeps "which GPU" from being
//! confused with priorities or counts, and gives `-1` a name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::AUTO_DEVICE;

/// Index of a compute device. `DeviceId::AUTO` (`-1`) means no preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub i32);

impl DeviceId {
    /// No device preference; routed to the legacy default sync manager.
    pub const AUTO: DeviceId = DeviceId(AUTO_DEVICE);

    /// Returns true if this id carries no device preference.
    #[inline]
    pub fn is_auto(self) -> bool {
        self.0 < 0
    }

    /// Returns the raw index.
    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::AUTO
    }
}

impl From<i32> for DeviceId {
    fn from(val: i32) -> Self {
        Self(val)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_auto() {
            f.write_str("auto")
        } else {
            write!(f, "gpu{}", self.0)
        }
    }
}
