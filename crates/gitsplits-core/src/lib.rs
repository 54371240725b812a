//! GitSplits Core - Canonical types for the command-orchestration pipeline
//!
//! This crate holds the vocabulary shared by every other GitSplits crate:
//! - ExecutionMode / ExperienceMode: per-user conversation settings
//! - IntentName / IntentParams: the closed set of commands and their typed parameters
//! - Plan: a time-boxed proposal awaiting approval
//! - PolicyDecision / SafetyAlert: outcomes of the pure gates
//! - ReplayableCommand: an envelope that can be re-run by event id
//! - PipelineError: the user-facing error taxonomy
//!
//! # Invariants
//!
//! 1. Value-moving intents never execute without passing the policy gate
//! 2. At most one pending plan per user
//! 3. Contributor percentages always sum to exactly 100
//! 4. Telemetry never fails the pipeline

pub mod allocation;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod repo;
pub mod types;

pub use allocation::*;
pub use clock::*;
pub use config::*;
pub use crypto::*;
pub use error::*;
pub use repo::*;
pub use types::*;
