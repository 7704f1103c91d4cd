//! Orbweave Engine - action registry and thread execution

pub mod action;
pub mod engine;

pub use action::{Action, ActionRegistry, FnAction};
pub use engine::{ExecutionEngine, ExecutionReport, StepResult};
