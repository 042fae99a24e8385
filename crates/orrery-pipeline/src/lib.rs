//! # orrery-pipeline
//!
//! Stage-ordered, group-atomic scheduling of physics modules across
//! synchronous CPU, async task and GPU substrates.
//!
//! ## Key Types
//!
//! - [`Pipeline`]: registry, view cache and frame executor behind one handle
//! - [`PhysicsModule`]: the module contract, with optional capabilities
//!   ([`ZeroCopyModule`], [`DynamicParameters`], [`SerializableModule`])
//! - [`SortedView`]: frozen, pre-partitioned execution order
//! - [`ErrorClassifier`]: fatal/recoverable split plus event reporting
//! - [`PipelineSnapshot`]: serializable module states and execution count
//! - [`PipelineConfig`]: scheduler settings, loadable from TOML

pub mod cancellation;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod descriptor;
mod executor;
pub mod graph;
pub mod module;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod snapshot;
pub mod view;

pub use cancellation::CancellationToken;
pub use catalog::ModuleCatalog;
pub use classifier::{categorize, ErrorCategory, ErrorClassifier};
pub use config::{PhysicsParams, PipelineConfig};
pub use descriptor::{Capabilities, GroupKey, ModuleDescriptor};
pub use graph::{BufferGraph, CountingGraph, GraphBuffers, GraphSummary, SimGraph};
pub use module::{
    DynamicParameters, ExecutionKind, GroupMode, PhysicsModule, SerializableModule, Stage,
    ZeroCopyModule,
};
pub use pipeline::Pipeline;
pub use report::{FrameReport, ModuleCompletion, ModuleFailure, ModuleTiming};
pub use snapshot::{PipelineSnapshot, RestoreReport};
pub use view::{GroupBatch, SortedView, StageBatch};
