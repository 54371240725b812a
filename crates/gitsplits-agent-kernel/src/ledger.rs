//! In-memory split ledger for tests and offline runs

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use gitsplits_core::{repo_key, PendingClaim, PendingVerification, Split, SplitContributor};

use crate::collaborators::{CollaboratorError, Result, SplitLedger};

/// Ledger backed by concurrent maps
///
/// Splits are keyed by lowercase `owner/name`; usernames are matched
/// case-insensitively.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    splits: DashMap<String, Split>,
    wallets: DashMap<String, String>,
    verifications: DashMap<String, PendingVerification>,
    claims: DashMap<String, Vec<PendingClaim>>,
    next_split: AtomicU64,
    next_claim: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a verified wallet
    pub fn with_wallet(self, github_username: &str, wallet: &str) -> Self {
        self.wallets
            .insert(github_username.to_lowercase(), wallet.to_string());
        self
    }

    /// Seed a split
    pub fn with_split(self, repo_url: &str, owner: &str, contributors: &[(&str, u32)]) -> Self {
        let contributors = contributors
            .iter()
            .map(|(username, percentage)| SplitContributor {
                github_username: username.to_string(),
                percentage: *percentage,
            })
            .collect();
        self.insert_split(repo_url, owner, contributors);
        self
    }

    pub fn split_count(&self) -> usize {
        self.splits.len()
    }

    pub fn pending_verification(&self, github_username: &str) -> Option<PendingVerification> {
        self.verifications
            .get(&github_username.to_lowercase())
            .map(|v| v.clone())
    }

    fn insert_split(
        &self,
        repo_url: &str,
        owner: &str,
        contributors: Vec<SplitContributor>,
    ) -> Split {
        let n = self.next_split.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let split = Split {
            id: format!("split-{}", n),
            repo_url: gitsplits_core::normalize_repo_url(repo_url),
            owner: owner.to_string(),
            contributors,
            created_at: now,
            updated_at: now,
        };
        self.splits.insert(repo_key(repo_url), split.clone());
        split
    }
}

#[async_trait]
impl SplitLedger for InMemoryLedger {
    async fn get_split(&self, repo_url: &str) -> Result<Option<Split>> {
        Ok(self.splits.get(&repo_key(repo_url)).map(|s| s.clone()))
    }

    async fn create_split(
        &self,
        repo_url: &str,
        owner: &str,
        contributors: Vec<SplitContributor>,
    ) -> Result<Split> {
        if self.splits.contains_key(&repo_key(repo_url)) {
            return Err(CollaboratorError::Rejected {
                message: format!("A split already exists for {}", repo_url),
            });
        }
        Ok(self.insert_split(repo_url, owner, contributors))
    }

    async fn update_split(
        &self,
        split_id: &str,
        contributors: Vec<SplitContributor>,
    ) -> Result<Split> {
        let mut entry = self
            .splits
            .iter_mut()
            .find(|entry| entry.id == split_id)
            .ok_or_else(|| CollaboratorError::NotFound {
                what: format!("Split {}", split_id),
            })?;
        entry.contributors = contributors;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn verified_wallet(&self, github_username: &str) -> Result<Option<String>> {
        Ok(self
            .wallets
            .get(&github_username.to_lowercase())
            .map(|w| w.clone()))
    }

    async fn store_verification(
        &self,
        github_username: &str,
        wallet: &str,
        linked_by: &str,
    ) -> Result<()> {
        let key = github_username.to_lowercase();
        tracing::debug!(github_username = %key, linked_by, "Stored verification");
        self.verifications.remove(&key);
        self.wallets.insert(key, wallet.to_string());
        Ok(())
    }

    async fn store_pending_verification(&self, verification: PendingVerification) -> Result<()> {
        self.verifications
            .insert(verification.github_username.to_lowercase(), verification);
        Ok(())
    }

    async fn store_pending_claim(
        &self,
        github_username: &str,
        amount: f64,
        token: &str,
    ) -> Result<String> {
        let n = self.next_claim.fetch_add(1, Ordering::SeqCst) + 1;
        let claim = PendingClaim {
            id: format!("claim-{}", n),
            github_username: github_username.to_string(),
            amount,
            token: token.to_string(),
            created_at: Utc::now(),
        };
        let id = claim.id.clone();
        self.claims
            .entry(github_username.to_lowercase())
            .or_default()
            .push(claim);
        Ok(id)
    }

    async fn pending_claims(&self, github_username: &str) -> Result<Vec<PendingClaim>> {
        Ok(self
            .claims
            .get(&github_username.to_lowercase())
            .map(|c| c.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_split_lookup_ignores_url_shape() {
        let ledger = InMemoryLedger::new().with_split("Org/Repo", "owner.near", &[("alice", 100)]);
        let split = ledger
            .get_split("https://github.com/org/repo")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(split.id, "split-1");
        assert_eq!(split.repo_url, "github.com/Org/Repo");
    }

    #[tokio::test]
    async fn test_update_replaces_contributors() {
        let ledger = InMemoryLedger::new().with_split("org/repo", "owner.near", &[("alice", 100)]);
        let updated = ledger
            .update_split(
                "split-1",
                vec![SplitContributor {
                    github_username: "bob".to_string(),
                    percentage: 100,
                }],
            )
            .await
            .unwrap();
        assert_eq!(updated.contributors[0].github_username, "bob");
        assert!(ledger.update_split("split-9", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_claims_accumulate_per_user() {
        let ledger = InMemoryLedger::new();
        let first = ledger.store_pending_claim("Bob", 5.0, "USDC").await.unwrap();
        let second = ledger.store_pending_claim("bob", 2.5, "USDC").await.unwrap();
        assert_ne!(first, second);
        let claims = ledger.pending_claims("BOB").await.unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims.iter().map(|c| c.amount).sum::<f64>(), 7.5);
    }

    #[tokio::test]
    async fn test_verification_links_wallet() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.verified_wallet("alice").await.unwrap(), None);
        ledger
            .store_verification("Alice", "alice.near", "alice")
            .await
            .unwrap();
        assert_eq!(
            ledger.verified_wallet("alice").await.unwrap(),
            Some("alice.near".to_string())
        );
    }
}
