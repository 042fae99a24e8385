//! Pipeline event types.
//!
//! Structured events emitted by the pipeline while it registers, runs
//! and retires modules. Events are lightweight value types that carry
//! just enough data to be useful for monitoring and debugging.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pipeline event.
///
/// Events are tagged with the execution count at the time of emission
/// and a wall-clock timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Number of frames completed when the event was emitted.
    pub execution_count: u64,
    /// Wall-clock emission time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub kind: EventKind,
}

/// Lifecycle phase in which a module call happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// `initialize` during `initialize_all`.
    Initialize,
    /// `execute_step` (or its zero-copy / async forms) during a frame.
    Execute,
    /// `cleanup` on removal, clear, or teardown.
    Cleanup,
    /// `save_state` while building a snapshot.
    SaveState,
    /// `load_state` while restoring a snapshot.
    LoadState,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initialize => "initialize",
            Phase::Execute => "execute",
            Phase::Cleanup => "cleanup",
            Phase::SaveState => "save_state",
            Phase::LoadState => "load_state",
        };
        f.write_str(name)
    }
}

/// Event payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    /// A module call failed and was classified.
    ModuleError {
        /// Module name.
        module: String,
        /// Rendered error message.
        error: String,
        /// Phase of the failed call.
        phase: Phase,
        /// Whether the failure aborts the current frame.
        is_fatal: bool,
    },

    /// Free-form pipeline log line.
    PipelineLog {
        /// Message text.
        message: String,
    },

    /// The set of registered modules changed.
    RegistryChanged {
        /// Number of registered modules after the change.
        count: usize,
    },

    /// A module was enabled or disabled.
    EnablementChanged {
        /// Module name.
        module: String,
        /// New enablement.
        enabled: bool,
    },

    /// A frame finished all stages.
    FrameCompleted {
        /// Modules dispatched during the frame.
        modules_executed: usize,
        /// Recoverable failures observed during the frame.
        recoverable_errors: usize,
        /// Wall-clock time for the frame (seconds).
        wall_time: f64,
    },

    /// Custom event for extensibility.
    Custom {
        /// Arbitrary label.
        label: String,
        /// JSON-encoded payload.
        payload: String,
    },
}

impl PipelineEvent {
    /// Creates a new event stamped with the current time.
    pub fn new(execution_count: u64, kind: EventKind) -> Self {
        Self {
            execution_count,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Creates a pipeline log event.
    pub fn log(execution_count: u64, message: impl Into<String>) -> Self {
        Self::new(
            execution_count,
            EventKind::PipelineLog {
                message: message.into(),
            },
        )
    }

    /// Returns true for module errors flagged fatal.
    pub fn is_fatal_error(&self) -> bool {
        matches!(self.kind, EventKind::ModuleError { is_fatal: true, .. })
    }
}
