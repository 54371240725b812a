//! Local reputation scoring

use async_trait::async_trait;

use gitsplits_core::{PayoutEligibility, ReputationProfile, ReputationTier, SubjectKind};

use crate::collaborators::{ReputationProvider, Result};

const AGENT_SCORE: u8 = 60;
const HUMAN_SCORE: u8 = 70;
const UNKNOWN_SCORE: u8 = 50;

/// Name-based reputation with a fixed score per subject kind
#[derive(Debug, Clone)]
pub struct HeuristicReputation {
    min_score: u8,
}

impl Default for HeuristicReputation {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HeuristicReputation {
    pub fn new(min_score: u8) -> Self {
        Self { min_score }
    }

    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    pub fn classify(subject: &str) -> SubjectKind {
        let normalized = subject.trim().trim_start_matches('@').to_lowercase();
        if normalized.is_empty() {
            SubjectKind::Unknown
        } else if normalized.contains("[bot]")
            || normalized.ends_with("-bot")
            || normalized.contains("agent")
        {
            SubjectKind::Agent
        } else {
            SubjectKind::Human
        }
    }

    fn score_for(kind: SubjectKind) -> u8 {
        match kind {
            SubjectKind::Agent => AGENT_SCORE,
            SubjectKind::Human => HUMAN_SCORE,
            SubjectKind::Unknown => UNKNOWN_SCORE,
        }
    }
}

#[async_trait]
impl ReputationProvider for HeuristicReputation {
    async fn profile(&self, subject: &str) -> Result<ReputationProfile> {
        let kind = Self::classify(subject);
        let score = Self::score_for(kind);
        Ok(ReputationProfile {
            subject: subject.trim().trim_start_matches('@').to_string(),
            kind,
            score,
            tier: ReputationTier::from_score(score),
            sources: vec!["local-heuristics".to_string()],
        })
    }

    async fn payout_eligibility(
        &self,
        github_username: &str,
        wallet: Option<&str>,
    ) -> Result<PayoutEligibility> {
        let profile = self.profile(github_username).await?;
        let mut reasons = Vec::new();
        if wallet.map_or(true, |w| w.trim().is_empty()) {
            reasons.push("Missing verified payout wallet.".to_string());
        }
        if profile.score < self.min_score {
            reasons.push(format!(
                "Reputation score {} below threshold {}.",
                profile.score, self.min_score
            ));
        }
        Ok(PayoutEligibility {
            eligible: reasons.is_empty(),
            reasons,
            score: Some(profile.score),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(HeuristicReputation::classify("dependabot[bot]"), SubjectKind::Agent);
        assert_eq!(HeuristicReputation::classify("deploy-bot"), SubjectKind::Agent);
        assert_eq!(HeuristicReputation::classify("@alice"), SubjectKind::Human);
        assert_eq!(HeuristicReputation::classify(""), SubjectKind::Unknown);
    }

    #[tokio::test]
    async fn test_profile_tiers() {
        let reputation = HeuristicReputation::default();
        let human = reputation.profile("alice").await.unwrap();
        assert_eq!(human.score, 70);
        assert_eq!(human.tier, ReputationTier::Silver);
        assert_eq!(human.sources, vec!["local-heuristics".to_string()]);
    }

    #[tokio::test]
    async fn test_eligibility_reasons() {
        let strict = HeuristicReputation::new(65);
        let decision = strict.payout_eligibility("ci-bot", None).await.unwrap();
        assert!(!decision.eligible);
        assert_eq!(
            decision.reasons,
            vec![
                "Missing verified payout wallet.".to_string(),
                "Reputation score 60 below threshold 65.".to_string(),
            ]
        );

        let ok = strict
            .payout_eligibility("alice", Some("alice.near"))
            .await
            .unwrap();
        assert!(ok.eligible);
        assert_eq!(ok.score, Some(70));
    }
}
