//! Observability seam
//!
//! The core never couples to a logging backend: cycle-level happenings are
//! handed to an [`ObservabilitySink`] the caller may provide. The default
//! sink does nothing, so every call site is infallible and the collaborator
//! stays genuinely optional.

use orbweave_core::ThreadId;
use std::sync::Arc;

/// What the cycle driver reports to the sink.
#[derive(Clone, Debug, PartialEq)]
pub enum ObservedEvent {
    SignalCaught {
        signal_id: String,
        thread_id: ThreadId,
    },
    SignalBounced {
        signal_id: String,
    },
    TemplateApplied {
        thread_id: ThreadId,
        template: String,
    },
    ThreadExecuted {
        thread_id: ThreadId,
        success: bool,
    },
    TrailsEvaporated {
        pruned: usize,
    },
}

/// Optional capability an external observability layer can plug in.
pub trait ObservabilitySink: Send + Sync {
    fn remember(&self, event: &ObservedEvent);
}

/// The default sink: remembers nothing.
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn remember(&self, _event: &ObservedEvent) {}
}

/// Per-cycle context handed to [`crate::Weaver::run_cycle`]. Collaborators
/// are optional; the context always holds a usable sink.
#[derive(Clone)]
pub struct CycleContext {
    sink: Arc<dyn ObservabilitySink>,
}

impl Default for CycleContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleContext {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(sink: Arc<dyn ObservabilitySink>) -> Self {
        Self { sink }
    }

    pub fn remember(&self, event: ObservedEvent) {
        self.sink.remember(&event);
    }
}
