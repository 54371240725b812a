//! GitSplits LLM - Verifiable Inference Abstraction
//!
//! One interface over chat-style inference providers that return a
//! cryptographic signature alongside each completion:
//!
//! - `VerifiableInferenceProvider`: HTTP chat-completions endpoint
//! - `MockInferenceProvider`: scripted replies for tests and offline runs
//!
//! ## Key Design Principles
//!
//! 1. LLMs may **classify** and **summarize**, NEVER **execute** payouts
//! 2. Every reply is sanitized before anything parses or displays it
//! 3. Callers always keep a deterministic fallback

pub mod prompts;
pub mod providers;
pub mod sanitize;
pub mod types;

pub use prompts::*;
pub use providers::*;
pub use sanitize::*;
pub use types::*;
