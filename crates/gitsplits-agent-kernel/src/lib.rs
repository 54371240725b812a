//! GitSplits AgentKernel - conversational command pipeline
//!
//! The kernel turns a free-text message into either a response, a plan
//! awaiting approval, or an executed action:
//! - control commands (`mode`, `experience`, `cancel`, `replay`, `approve`)
//! - deterministic intent resolution, with an assisted classifier in hands-off mode
//! - confidence and policy gates
//! - time-boxed plans for value-moving intents
//! - intent execution against pluggable collaborators
//!
//! # Key Principle
//!
//! `process_message` never fails. Every error becomes response text, and
//! nothing moves funds without passing the policy gate.

pub mod analyzer;
pub mod assistant;
pub mod collaborators;
pub mod control;
pub mod intents;
pub mod kernel;
pub mod ledger;
pub mod planner;
pub mod reputation;
pub mod state;

pub use analyzer::{GitHubAnalyzer, GitHubConfig, StaticAnalyzer};
pub use assistant::{format_assisted_suggestion, heuristic_assist, AssistedIntent, IntentAssistant};
pub use collaborators::{
    CollaboratorError, ReputationProvider, RepositoryAnalyzer, SplitLedger,
};
pub use control::ControlCommand;
pub use intents::{pattern_confidence, resolve, validate, IntentContext, IntentOutcome, Tools};
pub use kernel::{AgentKernel, KernelConfig};
pub use ledger::InMemoryLedger;
pub use planner::{create_action_plan, format_plan};
pub use reputation::HeuristicReputation;
pub use state::{
    AnalysisSnapshot, ConversationState, ConversationStore, CoverageSnapshot, PaymentSnapshot,
    RepoMemory, SplitSnapshot, StateUpdate, VerificationSnapshot,
};
