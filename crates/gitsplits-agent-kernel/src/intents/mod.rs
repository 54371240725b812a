//! Intent catalog: deterministic resolution, validation and execution
//!
//! Each intent owns an ordered list of case-insensitive patterns. The
//! first intent (in catalog order) with a matching pattern wins, and its
//! confidence is fixed per intent.

mod analyze;
mod create;
mod pay;
mod pending;
mod reputation;
mod verify;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};

use gitsplits_core::{
    validate_custom_allocation, AgentConfig, Allocation, ExecutionMode, InboundMessage,
    IntentName, IntentParams, PipelineError, ResolutionSource, ResolvedIntent,
};
use gitsplits_llm::InferenceProvider;
use gitsplits_payments::PaymentOrchestrator;

use crate::collaborators::{ReputationProvider, RepositoryAnalyzer, SplitLedger};
use crate::state::StateUpdate;

// ============================================================================
// Execution Inputs & Outputs
// ============================================================================

/// Collaborators available to intent executors
#[derive(Clone)]
pub struct Tools {
    pub analyzer: Arc<dyn RepositoryAnalyzer>,
    pub ledger: Arc<dyn SplitLedger>,
    pub reputation: Arc<dyn ReputationProvider>,
    pub inference: Arc<dyn InferenceProvider>,
    pub payments: PaymentOrchestrator,
}

/// Per-turn context handed to an executor
pub struct IntentContext<'a> {
    pub message: &'a InboundMessage,
    pub mode: ExecutionMode,
    /// Set when execution follows `approve`
    pub approved_plan_id: Option<&'a str>,
    pub config: &'a AgentConfig,
    pub now: DateTime<Utc>,
}

/// Response text plus state to merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentOutcome {
    pub response: String,
    pub update: StateUpdate,
}

impl IntentOutcome {
    pub fn reply(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            update: StateUpdate::default(),
        }
    }

    pub fn with_update(response: impl Into<String>, update: StateUpdate) -> Self {
        Self {
            response: response.into(),
            update,
        }
    }
}

type ExecResult = std::result::Result<IntentOutcome, PipelineError>;

// ============================================================================
// Catalog
// ============================================================================

const USERNAME: &str = r"[a-zA-Z0-9_.\-\[\]]+";

struct IntentDefinition {
    name: IntentName,
    confidence: f64,
    patterns: Vec<Regex>,
    extract: fn(&Captures) -> Option<IntentParams>,
}

fn patterns(sources: &[String]) -> Vec<Regex> {
    sources
        .iter()
        .map(|source| Regex::new(&format!("(?i){}", source)).expect("valid intent pattern"))
        .collect()
}

static CATALOG: LazyLock<Vec<IntentDefinition>> = LazyLock::new(|| {
    vec![
        IntentDefinition {
            name: IntentName::Analyze,
            confidence: 0.90,
            patterns: patterns(&[
                r"analyze\s+(?P<repo>.+)".to_string(),
                r"who\s+(?:contributes?\s+to|works?\s+on)\s+(?P<repo>.+)".to_string(),
                r"show\s+(?:me\s+)?(?:the\s+)?contributors?\s+(?:for|of)\s+(?P<repo>.+)".to_string(),
                r"what\s+(?:about|is)\s+(?P<repo>.+)".to_string(),
            ]),
            extract: extract_analyze,
        },
        IntentDefinition {
            name: IntentName::Create,
            confidence: 0.90,
            patterns: patterns(&[
                r"create\s+(?:a\s+)?(?:split\s+)?(?:for\s+)?(?P<rest>.+)".to_string(),
                r"set\s+up\s+(?:payments?\s+)?(?:for\s+)?(?P<rest>.+)".to_string(),
                r"make\s+(?:a\s+)?(?:split\s+)?(?:for\s+)?(?P<rest>.+)".to_string(),
            ]),
            extract: extract_create,
        },
        IntentDefinition {
            name: IntentName::Pay,
            confidence: 0.95,
            patterns: patterns(&[
                r"(?:pay|send|give)\s+(?P<amount>\d+(?:\.\d+)?)\s*(?P<token>\w+)\s+(?:to\s+)?(?P<repo>.+)"
                    .to_string(),
                r"distribute\s+\$?(?P<amount>\d+(?:\.\d+)?)\s*(?P<token>\w*)\s+(?:to\s+)?(?P<repo>.+)"
                    .to_string(),
            ]),
            extract: extract_pay,
        },
        IntentDefinition {
            name: IntentName::Pending,
            confidence: 0.85,
            patterns: patterns(&[
                r"pending\s+(?:claims?\s+)?(?:for\s+)?(?P<target>.+)".to_string(),
            ]),
            extract: extract_pending,
        },
        IntentDefinition {
            name: IntentName::Verify,
            confidence: 0.85,
            patterns: patterns(&[
                r"verify\s+contributors?\s+(?:for|of)\s+(?P<repo>.+)".to_string(),
                format!(r"verify\s+(?:my\s+)?(?:github\s+)?@?(?P<user>{})", USERNAME),
                format!(r"link\s+(?:my\s+)?(?:github\s+)?@?(?P<user>{})", USERNAME),
                format!(r"connect\s+(?:my\s+)?(?:github\s+)?@?(?P<user>{})", USERNAME),
            ]),
            extract: extract_verify,
        },
        IntentDefinition {
            name: IntentName::Reputation,
            confidence: 0.80,
            patterns: patterns(&[
                format!(r"reputation\s+(?:for\s+)?@?(?P<subject>{})", USERNAME),
                format!(r"is\s+@?(?P<subject>{})\s+(?:eligible|trusted|reputable)", USERNAME),
            ]),
            extract: extract_reputation,
        },
    ]
});

static ALLOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<repo>.+?)\s+(?:with\s+)?(?P<alloc>\d+(?:/\d+)+)")
        .expect("valid allocation regex")
});

/// First whitespace-delimited token, without trailing punctuation
///
/// Repository names never contain spaces, so anything after the first
/// token (e.g. "override safety") is free text.
fn first_token(raw: &str) -> String {
    raw.split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches([',', ';', '!', '?'])
        .to_string()
}

fn extract_analyze(caps: &Captures<'_>) -> Option<IntentParams> {
    let repo = first_token(caps.name("repo")?.as_str());
    Some(IntentParams::Analyze { repo })
}

fn extract_create(caps: &Captures<'_>) -> Option<IntentParams> {
    let rest = caps.name("rest")?.as_str().trim();
    if let Some(alloc_caps) = ALLOCATION_RE.captures(rest) {
        if let Some(allocation) = Allocation::parse(&alloc_caps["alloc"]) {
            return Some(IntentParams::Create {
                repo: first_token(&alloc_caps["repo"]),
                allocation,
            });
        }
    }
    Some(IntentParams::Create {
        repo: first_token(rest),
        allocation: Allocation::Default,
    })
}

fn extract_pay(caps: &Captures<'_>) -> Option<IntentParams> {
    let amount = caps.name("amount")?.as_str().parse::<f64>().ok()?;
    let token = caps
        .name("token")
        .map(|t| t.as_str().to_uppercase())
        // "pay 10 to org/repo" leaves the connective in the token slot
        .filter(|t| !t.is_empty() && t != "TO")
        .unwrap_or_else(|| "USDC".to_string());
    Some(IntentParams::Pay {
        amount,
        token,
        repo: first_token(caps.name("repo")?.as_str()),
    })
}

fn extract_pending(caps: &Captures<'_>) -> Option<IntentParams> {
    Some(IntentParams::Pending {
        target: first_token(caps.name("target")?.as_str()),
    })
}

fn extract_verify(caps: &Captures<'_>) -> Option<IntentParams> {
    if let Some(repo) = caps.name("repo") {
        return Some(IntentParams::Verify {
            repo: Some(first_token(repo.as_str())),
            github_username: None,
        });
    }
    let user = caps.name("user")?.as_str();
    // "verify contributors" without a repository is not a username
    if user.eq_ignore_ascii_case("contributor") || user.eq_ignore_ascii_case("contributors") {
        return None;
    }
    Some(IntentParams::Verify {
        repo: None,
        github_username: Some(user.to_string()),
    })
}

fn extract_reputation(caps: &Captures<'_>) -> Option<IntentParams> {
    Some(IntentParams::Reputation {
        subject: caps.name("subject")?.as_str().to_string(),
    })
}

/// Fixed confidence for a deterministic match
pub fn pattern_confidence(intent: IntentName) -> f64 {
    CATALOG
        .iter()
        .find(|def| def.name == intent)
        .map(|def| def.confidence)
        .unwrap_or(0.0)
}

/// Deterministic resolution; `None` when no pattern matches
pub fn resolve(text: &str) -> Option<ResolvedIntent> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for def in CATALOG.iter() {
        for pattern in &def.patterns {
            let Some(caps) = pattern.captures(text) else {
                continue;
            };
            if let Some(params) = (def.extract)(&caps) {
                return Some(ResolvedIntent {
                    params,
                    confidence: def.confidence,
                    source: ResolutionSource::Pattern,
                });
            }
        }
    }
    None
}

// ============================================================================
// Validation & Dispatch
// ============================================================================

/// Check parameters before anything executes
pub fn validate(params: &IntentParams) -> Result<(), PipelineError> {
    let blank = |s: &str| s.trim().is_empty();
    match params {
        IntentParams::Analyze { repo } => {
            if blank(repo) {
                return Err(PipelineError::validation("Repository is required"));
            }
        }
        IntentParams::Create { repo, allocation } => {
            if blank(repo) {
                return Err(PipelineError::validation("Repository is required"));
            }
            if let Allocation::Custom(shares) = allocation {
                validate_custom_allocation(shares)
                    .map_err(|e| PipelineError::validation(e.to_string()))?;
            }
        }
        IntentParams::Pay { amount, repo, .. } => {
            if !amount.is_finite() || *amount <= 0.0 {
                return Err(PipelineError::validation("Amount must be a positive number"));
            }
            if blank(repo) {
                return Err(PipelineError::validation("Repository is required"));
            }
        }
        IntentParams::Verify {
            repo,
            github_username,
        } => {
            let has_repo = repo.as_deref().is_some_and(|r| !blank(r));
            let has_user = github_username.as_deref().is_some_and(|u| !blank(u));
            if !has_repo && !has_user {
                return Err(PipelineError::validation(
                    "GitHub username or repository is required",
                ));
            }
        }
        IntentParams::Pending { target } => {
            if blank(target) {
                return Err(PipelineError::validation(
                    "Repository or GitHub username is required",
                ));
            }
        }
        IntentParams::Reputation { subject } => {
            if blank(subject) {
                return Err(PipelineError::validation("Subject is required"));
            }
        }
    }
    Ok(())
}

/// Validate, then run the intent's executor
///
/// Failures come back as the response text; this never errors.
pub async fn execute(
    params: &IntentParams,
    ctx: &IntentContext<'_>,
    tools: &Tools,
) -> IntentOutcome {
    if let Err(err) = validate(params) {
        return IntentOutcome::reply(err.to_string());
    }

    let result = match params {
        IntentParams::Analyze { repo } => analyze::execute(repo, ctx, tools).await,
        IntentParams::Create { repo, allocation } => {
            create::execute(repo, allocation, ctx, tools).await
        }
        IntentParams::Pay {
            amount,
            token,
            repo,
        } => pay::execute(*amount, token, repo, ctx, tools).await,
        IntentParams::Verify {
            repo,
            github_username,
        } => verify::execute(repo.as_deref(), github_username.as_deref(), ctx, tools).await,
        IntentParams::Pending { target } => pending::execute(target, ctx, tools).await,
        IntentParams::Reputation { subject } => reputation::execute(subject, tools).await,
    };

    result.unwrap_or_else(|err| {
        tracing::warn!(intent = %params.intent(), error = %err, "Intent execution failed");
        IntentOutcome::reply(err.to_string())
    })
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// `a, b, c` followed by `, +N more` past `limit`
pub(crate) fn list_with_overflow(items: &[String], limit: usize) -> String {
    let shown: Vec<&str> = items.iter().take(limit).map(String::as_str).collect();
    let mut text = shown.join(", ");
    if items.len() > limit {
        text.push_str(&format!(", +{} more", items.len() - limit));
    }
    text
}
