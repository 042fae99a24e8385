//! # orrery-telemetry
//!
//! Event bus for pipeline telemetry. Emits structured events
//! (module errors, pipeline log lines, registry and enablement changes,
//! frame completion) that can be consumed by pluggable sinks
//! (in-memory capture, `tracing`, UI callbacks).

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::EventBus;
pub use events::{EventKind, Phase, PipelineEvent};
pub use sinks::{CallbackSink, EventSink, TracingSink, VecSink};
