//! GitSplits Audit - Telemetry log and replay store
//!
//! Every pipeline transition produces a telemetry event. The log is
//! append-only NDJSON and writing to it never fails the caller. Commands that
//! reached intent resolution are also kept in a bounded replay store so they
//! can be re-run by event id.

pub mod replay;
pub mod telemetry;

pub use replay::*;
pub use telemetry::*;
