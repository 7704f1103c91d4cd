//! Orbweave Bus - tiered priority dispatch

pub mod bus;

pub use bus::{BusEvent, BusHandler, DispatchBus, Lane, Middleware, TickSummary, Verdict};
