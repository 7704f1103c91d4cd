//! Orbweave Trails - adaptive path records and routing
//!
//! Trails are scored, decaying records of previously successful routing
//! paths. Ants (in-flight routed requests) consult them before traversal
//! and feed outcomes back after: success strengthens, failure weakens, and
//! disuse evaporates.

pub mod router;
pub mod trail;

pub use router::PathRouter;
pub use trail::{decayed_strength, TrailStore};
