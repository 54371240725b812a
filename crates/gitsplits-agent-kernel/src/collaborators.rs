//! Capabilities the pipeline consumes but does not own
//!
//! Repository analysis, the split ledger and reputation lookups all live
//! behind these traits so the pipeline can run against in-memory stand-ins.

use async_trait::async_trait;
use thiserror::Error;

use gitsplits_core::{
    Contributor, PayoutEligibility, PendingClaim, PendingVerification, ReputationProfile, Split,
    SplitContributor,
};

/// Errors raised by collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{message} (the GitHub API rate limit may have been reached)")]
    RateLimited { message: String },

    #[error("{message}")]
    Unavailable { message: String },

    #[error("{message}")]
    Rejected { message: String },
}

impl CollaboratorError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CollaboratorError>;

/// Contribution analysis for a repository
#[async_trait]
pub trait RepositoryAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Contributors ordered by commits, highest first; percentages sum to 100
    async fn analyze(&self, repo_url: &str) -> Result<Vec<Contributor>>;
}

/// Durable split and verification state
#[async_trait]
pub trait SplitLedger: Send + Sync {
    async fn get_split(&self, repo_url: &str) -> Result<Option<Split>>;

    async fn create_split(
        &self,
        repo_url: &str,
        owner: &str,
        contributors: Vec<SplitContributor>,
    ) -> Result<Split>;

    async fn update_split(
        &self,
        split_id: &str,
        contributors: Vec<SplitContributor>,
    ) -> Result<Split>;

    /// Wallet linked to a GitHub username, if verified
    async fn verified_wallet(&self, github_username: &str) -> Result<Option<String>>;

    async fn store_verification(
        &self,
        github_username: &str,
        wallet: &str,
        linked_by: &str,
    ) -> Result<()>;

    async fn store_pending_verification(&self, verification: PendingVerification) -> Result<()>;

    /// Reserve funds for an unverified contributor; returns the claim id
    async fn store_pending_claim(
        &self,
        github_username: &str,
        amount: f64,
        token: &str,
    ) -> Result<String>;

    async fn pending_claims(&self, github_username: &str) -> Result<Vec<PendingClaim>>;
}

/// Reputation scoring and payout eligibility
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    async fn profile(&self, subject: &str) -> Result<ReputationProfile>;

    async fn payout_eligibility(
        &self,
        github_username: &str,
        wallet: Option<&str>,
    ) -> Result<PayoutEligibility>;
}
