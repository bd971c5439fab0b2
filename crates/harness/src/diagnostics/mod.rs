//! Failure diagnostics: the per-test start-time store and the collector
//! that gathers cluster artifacts when a test fails.

pub mod collector;
pub mod store;

pub use collector::Collector;
pub use store::DiagnosticStore;
