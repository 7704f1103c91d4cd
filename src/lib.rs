//! Orbweave - signal routing and dispatch core
//!
//! External signals come in through [`Weaver::submit_signal`]; the
//! stickiness gate decides which are worth acting on, the classifier shapes
//! them into prioritized threads, templates attach reusable execution plans,
//! and the engine runs plan steps against pluggable actions. A tiered
//! dispatch bus pumps events fairly, and a decay-based trail store
//! adaptively reinforces successful delivery paths.

pub mod observe;
pub mod weaver;

pub use observe::{CycleContext, NoopSink, ObservabilitySink, ObservedEvent};
pub use weaver::{
    CycleStatus, ExecutionTrigger, StatusSnapshot, Weaver, EXECUTE_CHANNEL, LIFECYCLE_CHANNEL,
};
