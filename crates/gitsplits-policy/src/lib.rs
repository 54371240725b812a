//! GitSplits Policy - Payout controls and approval rules
//!
//! The gate is a pure function of (intent, parameters, execution mode). Rules
//! are evaluated independently and accumulated: any single reason denies,
//! warnings never do and are attached to a plan's risks instead.

use gitsplits_core::{AgentConfig, ExecutionMode, IntentName, IntentParams, PolicyDecision};
use serde::{Deserialize, Serialize};

/// Settings the gate consults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub production: bool,
    /// Uppercase token symbols accepted for `pay`
    pub allowed_tokens: Vec<String>,
    pub max_payout_amount: f64,
    pub canary_only_pay: bool,
    /// Lowercase `owner/name` keys
    pub canary_repos: Vec<String>,
    pub require_approval: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for PolicyConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            production: config.production,
            allowed_tokens: config.allowed_tokens.clone(),
            max_payout_amount: config.max_payout_amount,
            canary_only_pay: config.canary_only_pay,
            canary_repos: config.canary_repos.clone(),
            require_approval: config.require_approval,
        }
    }
}

/// What the gate is asked to judge
#[derive(Debug, Clone, Copy)]
pub struct PolicyRequest<'a> {
    pub params: &'a IntentParams,
    pub mode: ExecutionMode,
}

impl<'a> PolicyRequest<'a> {
    pub fn new(params: &'a IntentParams, mode: ExecutionMode) -> Self {
        Self { params, mode }
    }

    pub fn intent(&self) -> IntentName {
        self.params.intent()
    }
}

/// Policy gate trait
pub trait PolicyGate: Send + Sync {
    fn evaluate(&self, request: &PolicyRequest<'_>) -> PolicyDecision;

    /// Whether an intent must always go through a plan
    fn requires_approval(&self, intent: IntentName) -> bool;
}

/// The default payout policy
#[derive(Debug, Clone, Default)]
pub struct PayoutPolicy {
    config: PolicyConfig,
}

impl PayoutPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn is_canary(&self, repo: &str) -> bool {
        let key = gitsplits_core::repo_key(repo);
        self.config.canary_repos.iter().any(|r| *r == key)
    }
}

impl PolicyGate for PayoutPolicy {
    fn evaluate(&self, request: &PolicyRequest<'_>) -> PolicyDecision {
        evaluate_policy(self, request)
    }

    fn requires_approval(&self, intent: IntentName) -> bool {
        self.config.require_approval && intent.is_action()
    }
}

/// Evaluate every rule and accumulate reasons and warnings
pub fn evaluate_policy(policy: &PayoutPolicy, request: &PolicyRequest<'_>) -> PolicyDecision {
    let config = &policy.config;
    let intent = request.intent();
    let mut reasons = Vec::new();
    let mut warnings = Vec::new();

    if request.mode == ExecutionMode::Advisor && intent.is_action() {
        reasons.push("Advisor mode does not execute on-chain/payment actions.".to_string());
    }

    if let IntentParams::Pay { amount, token, repo } = request.params {
        let token = token.to_uppercase();
        if !config.allowed_tokens.iter().any(|t| *t == token) {
            reasons.push(format!("Token {} is not allowed by policy.", token));
        }
        if !amount.is_finite() || *amount <= 0.0 {
            reasons.push("Pay amount must be positive.".to_string());
        } else if *amount > config.max_payout_amount {
            reasons.push(format!(
                "Pay amount {} exceeds policy max {}.",
                amount, config.max_payout_amount
            ));
        }
        if config.canary_only_pay && config.production && !policy.is_canary(repo) {
            reasons.push(
                "Pay intent is restricted to canary repositories in this environment.".to_string(),
            );
        }
    }

    if intent == IntentName::Create && config.production {
        warnings.push("Create intent will write split state on mainnet.".to_string());
    }

    PolicyDecision {
        allowed: reasons.is_empty(),
        reasons,
        warnings,
    }
}
