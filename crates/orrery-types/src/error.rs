//! Error types for the Orrery pipeline.
//!
//! All crates return `OrreryResult<T>` from fallible operations, and
//! physics modules report their own failures with the same type so the
//! pipeline can classify them as fatal or recoverable.

use thiserror::Error;

use crate::ids::DeviceId;

/// Unified error type for the Orrery pipeline.
#[derive(Debug, Error)]
pub enum OrreryError {
    /// Another enabled module already holds the exclusive group.
    #[error("Module '{module}' conflicts with enabled module '{holder}' in exclusive group '{group}'")]
    ExclusiveGroupConflict {
        module: String,
        group: String,
        holder: String,
    },

    /// No module with this name is registered.
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot failed validation; nothing was restored.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A module or collaborator ran out of memory.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// A module exhausted its stack.
    #[error("Stack overflow: {0}")]
    StackOverflow(String),

    /// A module touched memory it does not own.
    #[error("Invalid memory access: {0}")]
    InvalidMemoryAccess(String),

    /// The compute device disappeared (driver reset, removal, hang).
    #[error("GPU device {device} lost: {message}")]
    DeviceLost {
        device: DeviceId,
        message: String,
    },

    /// The frame observed a cancellation request.
    #[error("Operation cancelled")]
    Cancelled,

    /// GPU backend error that leaves the device usable.
    #[error("GPU error: {0}")]
    Gpu(String),

    /// A module reported an ordinary failure.
    #[error("Module failure: {0}")]
    Module(String),

    /// A module panicked; the panic was contained at the dispatch boundary.
    #[error("Module '{module}' panicked: {message}")]
    ModulePanicked {
        module: String,
        message: String,
    },

    /// A GPU-kind module failed; carries device and module context.
    #[error("GPU module '{module}' failed on device {device} ({}): {source}", .device_name.as_deref().unwrap_or("unknown"))]
    GpuModule {
        module: String,
        device: DeviceId,
        device_name: Option<String>,
        #[source]
        source: Box<OrreryError>,
    },

    /// The worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl OrreryError {
    /// Shorthand for an ordinary module failure.
    pub fn module(message: impl Into<String>) -> Self {
        Self::Module(message.into())
    }

    /// Returns the innermost error, looking through GPU context wrappers.
    pub fn root_cause(&self) -> &OrreryError {
        match self {
            OrreryError::GpuModule { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenience alias for `Result<T, OrreryError>`.
pub type OrreryResult<T> = Result<T, OrreryError>;
