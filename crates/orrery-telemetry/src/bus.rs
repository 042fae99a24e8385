//! Event bus: broadcast-style event dispatch with pluggable sinks.
//!
//! The bus uses `std::sync::mpsc` so any worker thread can emit through
//! a shared reference while a frame is in flight. Sinks receive events
//! when the bus is flushed, which the pipeline does at the end of every
//! frame and before a fatal error is propagated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use parking_lot::Mutex;

use crate::events::PipelineEvent;
use crate::sinks::EventSink;

/// Broadcast event bus for pipeline telemetry.
///
/// The producer side (`emit`) queues events; `flush` hands every queued
/// event to each registered sink in registration order.
pub struct EventBus {
    /// Channel sender, shared by all emitting threads.
    sender: mpsc::Sender<PipelineEvent>,
    /// Channel receiver, drained on flush.
    receiver: Mutex<mpsc::Receiver<PipelineEvent>>,
    /// Registered sinks.
    sinks: Mutex<Vec<Box<dyn EventSink>>>,
    /// Whether the bus is active. Disabled bus is a no-op.
    enabled: AtomicBool,
}

impl EventBus {
    /// Creates a new event bus with no sinks.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            sinks: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Registers a sink to receive events.
    pub fn add_sink(&self, sink: Box<dyn EventSink>) {
        self.sinks.lock().push(sink);
    }

    /// Enables or disables the bus. Disabled bus drops events silently.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Returns true if the bus is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Emit an event. If the bus is disabled, this is a no-op.
    pub fn emit(&self, event: PipelineEvent) {
        if !self.is_enabled() {
            return;
        }
        // The receiver lives as long as the bus, so send cannot fail here.
        let _ = self.sender.send(event);
    }

    /// Flush all pending events to registered sinks.
    pub fn flush(&self) {
        let receiver = self.receiver.lock();
        let mut sinks = self.sinks.lock();
        while let Ok(event) = receiver.try_recv() {
            for sink in sinks.iter_mut() {
                sink.handle(&event);
            }
        }
    }

    /// Flushes pending events, then lets every sink finalize.
    pub fn finalize(&self) {
        self.flush();
        for sink in self.sinks.lock().iter_mut() {
            sink.finalize();
        }
    }

    /// Returns the number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
