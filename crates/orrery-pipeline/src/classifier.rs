//! Error classifier: splits module failures into fatal and recoverable.
//!
//! Fatal errors abort the current frame and propagate to the caller;
//! everything else is reported and the frame carries on. Every
//! classification is published on the event bus before the caller acts
//! on it.

use std::sync::Arc;

use orrery_telemetry::{EventBus, EventKind, Phase, PipelineEvent};
use orrery_types::OrreryError;

/// Severity of a module failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Fatal,
    Recoverable,
}

impl ErrorCategory {
    pub fn is_fatal(self) -> bool {
        self == ErrorCategory::Fatal
    }
}

/// Category of `error`, looking through GPU context wrappers.
pub fn categorize(error: &OrreryError) -> ErrorCategory {
    match error.root_cause() {
        OrreryError::OutOfMemory(_)
        | OrreryError::StackOverflow(_)
        | OrreryError::InvalidMemoryAccess(_)
        | OrreryError::DeviceLost { .. }
        | OrreryError::Cancelled => ErrorCategory::Fatal,
        _ => ErrorCategory::Recoverable,
    }
}

/// Classifies failures and reports them.
pub struct ErrorClassifier {
    bus: Arc<EventBus>,
}

impl ErrorClassifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Classifies, emits a module-error event, and logs.
    pub fn classify(
        &self,
        module: &str,
        error: &OrreryError,
        phase: Phase,
        execution_count: u64,
    ) -> ErrorCategory {
        let category = categorize(error);
        let is_fatal = category.is_fatal();

        self.bus.emit(PipelineEvent::new(
            execution_count,
            EventKind::ModuleError {
                module: module.to_string(),
                error: error.to_string(),
                phase,
                is_fatal,
            },
        ));

        if is_fatal {
            tracing::error!(module, %phase, error = %error, "fatal module error");
        } else {
            tracing::warn!(module, %phase, error = %error, "recoverable module error");
        }
        category
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}
