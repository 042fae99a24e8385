//! Per-frame results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::module::{ExecutionKind, Stage};

/// Wall-clock duration of one module dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleTiming {
    pub module: String,
    pub stage: Stage,
    pub kind: ExecutionKind,
    pub duration: Duration,
}

/// A recoverable failure observed during a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFailure {
    pub module: String,
    pub error: String,
}

/// Streamed once per finished async module by the channel variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleCompletion {
    pub module: String,
    pub duration: Duration,
    /// Rendered error, if the module failed.
    pub error: Option<String>,
}

impl ModuleCompletion {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one completed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Pipeline execution count after this frame.
    pub execution_count: u64,
    /// Frame wall time.
    pub wall_time: Duration,
    /// Modules dispatched.
    pub modules_executed: usize,
    /// Empty when timing capture is off.
    pub timings: Vec<ModuleTiming>,
    pub failures: Vec<ModuleFailure>,
}

impl FrameReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Timing for `module`, if recorded.
    pub fn timing(&self, module: &str) -> Option<Duration> {
        self.timings
            .iter()
            .find(|t| t.module == module)
            .map(|t| t.duration)
    }
}
