//! Pluggable event sinks.
//!
//! Sinks consume events from the bus and process them
//! (capture in memory, forward to `tracing`, drive a UI callback).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{EventKind, PipelineEvent};

/// Trait for event consumers.
///
/// Implement this to create custom telemetry outputs.
pub trait EventSink: Send {
    /// Process a single event.
    fn handle(&mut self, event: &PipelineEvent);

    /// Called when the pipeline shuts down. Flush buffers, close files, etc.
    fn finalize(&mut self) {}

    /// Returns a human-readable name for this sink.
    fn name(&self) -> &str;
}

/// A sink that collects events into a shared `Vec` for tests and inspection.
///
/// The sink is boxed into the bus, so keep the handle from
/// [`VecSink::events_handle`] to look at what arrived.
pub struct VecSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl VecSink {
    /// Creates an empty vec sink.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a shared handle to the collected events.
    pub fn events_handle(&self) -> Arc<Mutex<Vec<PipelineEvent>>> {
        Arc::clone(&self.events)
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecSink {
    fn handle(&mut self, event: &PipelineEvent) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// A sink that logs events using the `tracing` crate.
///
/// Fatal module errors are logged at `error`, recoverable ones at `warn`,
/// everything else at `debug`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingSink {
    fn handle(&mut self, event: &PipelineEvent) {
        match &event.kind {
            EventKind::ModuleError { module, error, phase, is_fatal: true } => {
                tracing::error!(
                    execution_count = event.execution_count,
                    module = %module,
                    phase = %phase,
                    "fatal module error: {error}"
                );
            }
            EventKind::ModuleError { module, error, phase, is_fatal: false } => {
                tracing::warn!(
                    execution_count = event.execution_count,
                    module = %module,
                    phase = %phase,
                    "recoverable module error: {error}"
                );
            }
            other => {
                tracing::debug!(
                    execution_count = event.execution_count,
                    event = ?other,
                    "pipeline_event"
                );
            }
        }
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}

/// A sink that forwards every event to a closure.
///
/// Useful for progressive UI updates or bridging into another channel.
pub struct CallbackSink<F>
where
    F: FnMut(&PipelineEvent) + Send,
{
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: FnMut(&PipelineEvent) + Send,
{
    /// Wraps a closure as a sink.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: FnMut(&PipelineEvent) + Send,
{
    fn handle(&mut self, event: &PipelineEvent) {
        (self.callback)(event)
    }

    fn name(&self) -> &str {
        "callback_sink"
    }
}
