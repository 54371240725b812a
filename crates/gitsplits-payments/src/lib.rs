//! GitSplits Payments - Engines and failover orchestration
//!
//! Each payment engine exposes a single capability: distribute an amount of a
//! token across recipients with pre-normalized percentages. The orchestrator
//! picks a primary engine for a payout and, when the cross-chain rail fails,
//! makes at most one fallback attempt on the native rail.
//!
//! # Key Principle
//!
//! **Exactly one successful distribution call per logical payout.**
//!
//! Engine calls are strictly sequential. The orchestrator never splits
//! amounts itself and never retries the engine that just failed.

pub mod engine;
pub mod orchestrator;
pub mod rails;

pub use engine::*;
pub use orchestrator::*;
pub use rails::*;
