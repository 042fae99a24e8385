//! Physics module trait: the unit of work the pipeline schedules.
//!
//! Every physics module implements [`PhysicsModule`], enabling the
//! pipeline to order, enable, execute and retire it without knowing
//! what it computes.
//!
//! Modules are shared across worker threads (parallel groups, per-device
//! GPU units, async batches), so all entry points take `&self`; a module
//! keeps its mutable state behind its own locks.

use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use orrery_types::{DeviceId, OrreryResult};

use crate::config::PhysicsParams;
use crate::graph::{GraphBuffers, SimGraph};

/// Execution substrate of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionKind {
    /// Runs on the calling thread or the CPU worker pool.
    SyncCpu,
    /// Runs as an awaitable task; always fanned out within its group.
    AsyncTask,
    /// Dispatched to a device inside a barrier bracket.
    Gpu,
}

/// Ordered execution phase. Stages form strict barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Preparation,
    Forces,
    Integration,
    PostProcess,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::Preparation,
        Stage::Forces,
        Stage::Integration,
        Stage::PostProcess,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preparation => "preparation",
            Stage::Forces => "forces",
            Stage::Integration => "integration",
            Stage::PostProcess => "post_process",
        };
        f.write_str(name)
    }
}

/// How synchronous CPU members of a group are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GroupMode {
    /// One after another in priority order.
    #[default]
    Sequential,
    /// Fanned out across the worker pool.
    Parallel,
}

/// Trait for physics modules.
///
/// The pipeline calls these methods in order:
///
/// ```text
/// module.initialize(graph)?;
/// loop {
///     module.execute_step(graph, dt)?;   // while enabled
/// }
/// module.cleanup()?;                     // on removal or teardown
/// ```
///
/// Metadata getters are read once at registration; changing what they
/// return afterwards has no effect until the module is re-registered.
pub trait PhysicsModule: Send + Sync {
    /// Unique module name.
    fn name(&self) -> &str;

    /// Enablement applied at registration.
    fn enabled_by_default(&self) -> bool {
        true
    }

    /// Execution substrate.
    fn execution_kind(&self) -> ExecutionKind {
        ExecutionKind::SyncCpu
    }

    /// Stage the module runs in.
    fn stage(&self) -> Stage {
        Stage::Forces
    }

    /// Priority within the stage; lower runs earlier.
    fn priority(&self) -> i32 {
        0
    }

    /// Free-form category for lookups.
    fn category(&self) -> &str {
        "general"
    }

    /// Named group the module completes atomically with.
    fn module_group(&self) -> Option<&str> {
        None
    }

    /// Dispatch mode; only the group's first member decides.
    fn group_mode(&self) -> GroupMode {
        GroupMode::Sequential
    }

    /// At most one enabled module per exclusive group.
    fn exclusive_group(&self) -> Option<&str> {
        None
    }

    /// Device preference for GPU modules.
    fn preferred_device(&self) -> DeviceId {
        DeviceId::AUTO
    }

    /// One-time setup against the graph.
    fn initialize(&self, graph: &dyn SimGraph) -> OrreryResult<()> {
        let _ = graph;
        Ok(())
    }

    /// Advance the module by one timestep.
    fn execute_step(&self, graph: &dyn SimGraph, dt: f64) -> OrreryResult<()>;

    /// Awaitable step used for [`ExecutionKind::AsyncTask`] modules.
    ///
    /// Defaults to running `execute_step` inside the future.
    fn execute_step_async<'a>(
        &'a self,
        graph: &'a dyn SimGraph,
        dt: f64,
    ) -> BoxFuture<'a, OrreryResult<()>> {
        Box::pin(async move { self.execute_step(graph, dt) })
    }

    /// Release resources. Called on removal, clear, or teardown.
    fn cleanup(&self) -> OrreryResult<()> {
        Ok(())
    }

    /// Zero-copy capability.
    fn as_zero_copy(&self) -> Option<&dyn ZeroCopyModule> {
        None
    }

    /// Dynamic-parameter capability.
    fn as_dynamic(&self) -> Option<&dyn DynamicParameters> {
        None
    }

    /// Serializable-state capability.
    fn as_serializable(&self) -> Option<&dyn SerializableModule> {
        None
    }
}

/// Modules that can step directly over the graph's raw buffers.
///
/// Must leave the graph in the same state `execute_step` would.
pub trait ZeroCopyModule: Send + Sync {
    fn execute_span(&self, buffers: GraphBuffers<'_>, dt: f64) -> OrreryResult<()>;
}

/// Modules that consume the per-frame parameter value.
///
/// Called once per frame, before the step.
pub trait DynamicParameters: Send + Sync {
    fn update_parameters(&self, params: &PhysicsParams) -> OrreryResult<()>;
}

/// Modules whose state can be captured into a snapshot.
pub trait SerializableModule: Send + Sync {
    /// Capture the current state. `None` means "nothing to save".
    fn save_state(&self) -> OrreryResult<Option<serde_json::Value>>;

    /// Restore a state previously produced by `save_state`.
    fn load_state(&self, state: &serde_json::Value) -> OrreryResult<()>;
}
