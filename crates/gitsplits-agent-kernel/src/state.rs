//! Per-user conversation state

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use gitsplits_core::{
    repo_key, short_hash, Contributor, ExecutionMode, ExperienceMode, PendingVerification, Plan,
};

// ============================================================================
// Snapshots
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSnapshot {
    pub repo_url: String,
    pub contributors: Vec<Contributor>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSnapshot {
    pub id: String,
    pub repo_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSnapshot {
    pub split_id: String,
    pub repo_url: String,
    pub amount: f64,
    pub token: String,
    pub tx_hash: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSnapshot {
    pub github_username: String,
    pub wallet: String,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSnapshot {
    pub repo_url: String,
    pub checked: usize,
    pub verified: usize,
    pub unverified: usize,
    pub skipped: usize,
    pub timestamp: DateTime<Utc>,
}

/// Fields an executed intent asks to merge into the conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub last_analysis: Option<AnalysisSnapshot>,
    pub last_split: Option<SplitSnapshot>,
    pub last_payment: Option<PaymentSnapshot>,
    pub pending_verification: Option<PendingVerification>,
    pub last_verification: Option<VerificationSnapshot>,
    pub last_verification_coverage: Option<CoverageSnapshot>,
}

// ============================================================================
// Repository Memory
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepoMemory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analysis_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_split_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_tx: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RepoMemory {
    /// Overwrite only the fields `patch` carries
    pub fn merge(&mut self, patch: RepoMemory) {
        if patch.last_analysis_hash.is_some() {
            self.last_analysis_hash = patch.last_analysis_hash;
        }
        if patch.last_split_id.is_some() {
            self.last_split_id = patch.last_split_id;
        }
        if patch.last_payment_at.is_some() {
            self.last_payment_at = patch.last_payment_at;
        }
        if patch.last_payment_tx.is_some() {
            self.last_payment_tx = patch.last_payment_tx;
        }
        if patch.updated_at.is_some() {
            self.updated_at = patch.updated_at;
        }
    }
}

// ============================================================================
// Conversation State
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    /// `None` until the user picks a mode
    pub execution_mode: Option<ExecutionMode>,
    pub experience_mode: ExperienceMode,
    pub pending_plan: Option<Plan>,
    pub last_analysis: Option<AnalysisSnapshot>,
    pub last_split: Option<SplitSnapshot>,
    pub last_payment: Option<PaymentSnapshot>,
    pub pending_verification: Option<PendingVerification>,
    pub last_verification: Option<VerificationSnapshot>,
    pub last_verification_coverage: Option<CoverageSnapshot>,
    pub repo_memory: HashMap<String, RepoMemory>,
}

impl ConversationState {
    pub fn execution_mode_or(&self, default: ExecutionMode) -> ExecutionMode {
        self.execution_mode.unwrap_or(default)
    }

    /// Merge an executed intent's results, then refresh repository memory
    pub fn apply(&mut self, update: StateUpdate, now: DateTime<Utc>) {
        let memory_target = update
            .last_analysis
            .as_ref()
            .map(|a| a.repo_url.clone())
            .or_else(|| update.last_split.as_ref().map(|s| s.repo_url.clone()))
            .or_else(|| update.last_payment.as_ref().map(|p| p.repo_url.clone()))
            .or_else(|| self.last_analysis.as_ref().map(|a| a.repo_url.clone()));

        let key = memory_target.as_deref().map(repo_key);
        let same_repo = |repo_url: &str| key.as_deref() == Some(repo_key(repo_url).as_str());

        // Earlier snapshots only count toward the repository they describe
        let contributors = update
            .last_analysis
            .as_ref()
            .or(self.last_analysis.as_ref().filter(|a| same_repo(&a.repo_url)))
            .map(|a| a.contributors.clone())
            .unwrap_or_default();
        let split_id = update
            .last_split
            .as_ref()
            .map(|s| s.id.clone())
            .or_else(|| update.last_payment.as_ref().map(|p| p.split_id.clone()))
            .or_else(|| {
                self.last_split
                    .as_ref()
                    .filter(|s| same_repo(&s.repo_url))
                    .map(|s| s.id.clone())
            });
        let payment = update.last_payment.clone();

        if update.last_analysis.is_some() {
            self.last_analysis = update.last_analysis;
        }
        if update.last_split.is_some() {
            self.last_split = update.last_split;
        }
        if update.last_payment.is_some() {
            self.last_payment = update.last_payment;
        }
        if update.pending_verification.is_some() {
            self.pending_verification = update.pending_verification;
        }
        if update.last_verification.is_some() {
            self.last_verification = update.last_verification;
        }
        if update.last_verification_coverage.is_some() {
            self.last_verification_coverage = update.last_verification_coverage;
        }

        let Some(key) = key else {
            return;
        };
        let patch = RepoMemory {
            last_analysis_hash: analysis_hash(&contributors),
            last_split_id: split_id,
            last_payment_at: payment.as_ref().map(|p| p.timestamp),
            last_payment_tx: payment.map(|p| p.tx_hash),
            updated_at: Some(now),
        };
        self.repo_memory
            .entry(key)
            .or_default()
            .merge(patch);
    }
}

/// 16-hex fingerprint of a contributor list
pub fn analysis_hash(contributors: &[Contributor]) -> Option<String> {
    if contributors.is_empty() {
        return None;
    }
    let json = serde_json::to_string(contributors).ok()?;
    Some(short_hash(json.as_bytes(), 16))
}

// ============================================================================
// Store
// ============================================================================

/// Conversation states keyed by author
///
/// Each entry has its own async lock, so turns for one user run one at a
/// time while different users proceed in parallel.
#[derive(Debug, Default)]
pub struct ConversationStore {
    states: DashMap<String, Arc<Mutex<ConversationState>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for a user's state, created on first use
    pub fn handle(&self, author: &str) -> Arc<Mutex<ConversationState>> {
        self.states
            .entry(author.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::default())))
            .clone()
    }

    pub async fn snapshot(&self, author: &str) -> Option<ConversationState> {
        let handle = self.states.get(author).map(|h| h.clone())?;
        let state = handle.lock().await;
        Some(state.clone())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
