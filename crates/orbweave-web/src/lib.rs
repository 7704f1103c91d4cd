//! Orbweave Web - stickiness gate, classifier, stores, and templates
//!
//! The catching surface of the system: pure decision logic that turns raw
//! signals into thread shapes, the stores that hold signals and threads, and
//! the registry of reusable execution templates.

pub mod classifier;
pub mod store;
pub mod templates;

pub use classifier::{classify, default_priority, should_stick, Classification};
pub use store::{SignalStore, ThreadStore};
pub use templates::TemplateRegistry;
