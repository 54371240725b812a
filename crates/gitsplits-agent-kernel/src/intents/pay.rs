use futures::future::join_all;

use gitsplits_core::{
    normalize_repo_url, rebalance_shares, PayoutEligibility, PipelineError, RecipientSnapshot,
    SplitContributor,
};
use gitsplits_guard::{inspect_distribution_risk, should_block_for_safety};
use gitsplits_payments::{DistributionRequest, EngineTag, PayoutRecipient};

use super::{ExecResult, IntentContext, IntentOutcome, Tools};
use crate::collaborators::CollaboratorError;
use crate::state::{PaymentSnapshot, StateUpdate};

const STRICT_PHRASES: [&str; 3] = ["strict", "all-verified", "all verified"];
const MAX_EXCLUDED_SHOWN: usize = 8;

struct Resolved<'a> {
    contributor: &'a SplitContributor,
    wallet: Option<String>,
}

struct Eligible<'a> {
    contributor: &'a SplitContributor,
    wallet: String,
}

pub(super) async fn execute(
    amount: f64,
    token: &str,
    repo: &str,
    ctx: &IntentContext<'_>,
    tools: &Tools,
) -> ExecResult {
    let repo_url = normalize_repo_url(repo);
    let verify_url = &ctx.config.verify_base_url;
    let failed = |e: CollaboratorError| PipelineError::collaborator("Payment failed", e);

    let Some(split) = tools.ledger.get_split(&repo_url).await.map_err(failed)? else {
        return Ok(IntentOutcome::reply(format!(
            "No split found for {}. Create one first with: \"@gitsplits create {}\"",
            repo_url, repo_url
        )));
    };

    let wallets = join_all(
        split
            .contributors
            .iter()
            .map(|c| tools.ledger.verified_wallet(&c.github_username)),
    )
    .await;
    let mut resolved = Vec::with_capacity(split.contributors.len());
    for (contributor, wallet) in split.contributors.iter().zip(wallets) {
        resolved.push(Resolved {
            contributor,
            wallet: wallet.map_err(failed)?,
        });
    }

    let unverified: Vec<&Resolved> = resolved.iter().filter(|r| r.wallet.is_none()).collect();
    let text = ctx.message.text.to_lowercase();
    let strict = STRICT_PHRASES.iter().any(|phrase| text.contains(phrase));
    if strict && !unverified.is_empty() {
        let names: Vec<&str> = unverified
            .iter()
            .map(|r| r.contributor.github_username.as_str())
            .collect();
        return Ok(IntentOutcome::reply(format!(
            "❌ Strict mode enabled: payment blocked because {} contributors are unverified.\n\nUnverified: {}\nAsk them to verify at {}",
            unverified.len(),
            names.join(", "),
            verify_url
        )));
    }

    // Eligibility for every verified contributor, in parallel
    let verified: Vec<(&SplitContributor, &str)> = resolved
        .iter()
        .filter_map(|r| r.wallet.as_deref().map(|w| (r.contributor, w)))
        .collect();
    let decisions = join_all(verified.iter().map(|&(c, wallet)| {
        tools
            .reputation
            .payout_eligibility(&c.github_username, Some(wallet))
    }))
    .await;

    let mut eligible = Vec::new();
    let mut excluded: Vec<(&SplitContributor, PayoutEligibility)> = Vec::new();
    for (&(contributor, wallet), decision) in verified.iter().zip(decisions) {
        let decision = decision.map_err(failed)?;
        if decision.eligible {
            eligible.push(Eligible {
                contributor,
                wallet: wallet.to_string(),
            });
        } else {
            excluded.push((contributor, decision));
        }
    }

    if eligible.is_empty() {
        return Ok(IntentOutcome::reply(format!(
            "❌ No payout-eligible verified contributors found for {}. Nothing can be paid yet.\n\nAsk contributors to verify at {}",
            repo_url, verify_url
        )));
    }

    // Safety review happens before anything is written
    let snapshots: Vec<RecipientSnapshot> = resolved
        .iter()
        .map(|r| {
            RecipientSnapshot::new(
                r.contributor.github_username.clone(),
                r.contributor.percentage as f64,
                r.wallet.clone(),
            )
        })
        .collect();
    let alerts = inspect_distribution_risk(&snapshots);
    if should_block_for_safety(&alerts, &ctx.message.text) {
        tracing::warn!(repo = %repo_url, alerts = alerts.len(), "Payout blocked by safety review");
        return Err(PipelineError::SafetyBlocked { alerts });
    }

    let verified_pct: f64 = eligible
        .iter()
        .map(|e| e.contributor.percentage as f64)
        .sum();
    let distributable = amount * verified_pct / 100.0;
    let shares = rebalance_shares(
        &eligible
            .iter()
            .map(|e| e.contributor.percentage as f64)
            .collect::<Vec<_>>(),
    );

    let request = DistributionRequest {
        split_id: split.id.clone(),
        amount: distributable,
        token: token.to_string(),
        recipients: eligible
            .iter()
            .zip(shares)
            .map(|(e, percentage)| PayoutRecipient {
                wallet: e.wallet.clone(),
                percentage,
            })
            .collect(),
    };
    let distribution = tools
        .payments
        .distribute(&request, &ctx.message.text)
        .await
        .map_err(|e| PipelineError::PaymentEngineFailure {
            message: e.to_string(),
        })?;

    // Claims are only recorded once the distribution has gone through
    let mut pending_lines = Vec::new();
    for entry in &unverified {
        let username = &entry.contributor.github_username;
        let owed = amount * entry.contributor.percentage as f64 / 100.0;
        let claim = match tools.ledger.store_pending_claim(username, owed, token).await {
            Ok(claim_id) => format!("claim id: {}", claim_id),
            Err(e) => {
                tracing::warn!(user = %username, error = %e, "Pending claim not recorded");
                "claim not recorded".to_string()
            }
        };
        pending_lines.push(format!("- {}: {:.4} {} ({})", username, owed, token, claim));
    }

    let mut response = format!(
        "✅ Distributed {:.4} {} to {} payout-eligible verified contributors via {}!\n\n\
Coverage: {}/{} contributors eligible+verified\n\
Payment mode: agent_rails_{}\n\
🌐 Protocol: {}\n\
🔗 Transaction: {}\n\
📜 Split: {}",
        distributable,
        token,
        eligible.len(),
        provider_label(distribution.engine),
        eligible.len(),
        split.contributors.len(),
        distribution.engine,
        distribution.protocol,
        distribution.tx_hash,
        split.id
    );

    if !alerts.is_empty() {
        let codes: Vec<&str> = alerts.iter().map(|a| a.code.as_str()).collect();
        response.push_str(&format!("\n⚠️ Safety flags: {}", codes.join(", ")));
    }
    if !pending_lines.is_empty() {
        response.push_str(&format!(
            "\n\n⏳ Pending claims for unverified contributors ({}):\n{}\n\nInvite them to verify: {}",
            pending_lines.len(),
            pending_lines.join("\n"),
            verify_url
        ));
    }
    if !excluded.is_empty() {
        let lines: Vec<String> = excluded
            .iter()
            .take(MAX_EXCLUDED_SHOWN)
            .map(|(contributor, decision)| {
                let score = decision
                    .score
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "n/a".to_string());
                format!(
                    "- {}: score {} ({})",
                    contributor.github_username,
                    score,
                    decision.reasons.join("; ")
                )
            })
            .collect();
        response.push_str(&format!(
            "\n\n🚫 Excluded by eligibility policy ({}):\n{}",
            excluded.len(),
            lines.join("\n")
        ));
    }

    tracing::info!(
        split_id = %split.id,
        engine = %distribution.engine,
        recipients = eligible.len(),
        pending = pending_lines.len(),
        approved_plan = ctx.approved_plan_id.unwrap_or("-"),
        "Payout completed"
    );

    Ok(IntentOutcome::with_update(
        response,
        StateUpdate {
            last_payment: Some(PaymentSnapshot {
                split_id: split.id,
                repo_url,
                amount: distributable,
                token: token.to_string(),
                tx_hash: distribution.tx_hash,
                timestamp: ctx.now,
            }),
            ..StateUpdate::default()
        },
    ))
}

fn provider_label(engine: EngineTag) -> &'static str {
    match engine {
        EngineTag::EngineA => "Intents Rail",
        EngineTag::EngineB => "Native Rail",
        EngineTag::EngineBFallback => "Native Rail (Intents Rail fallback)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    use gitsplits_core::{AgentConfig, Channel, InboundMessage, ReputationProfile};
    use gitsplits_llm::MockInferenceProvider;
    use gitsplits_payments::{
        IntentsRailConfig, IntentsRailEngine, NativeRailConfig, NativeRailEngine,
        PaymentOrchestrator,
    };

    use crate::analyzer::StaticAnalyzer;
    use crate::collaborators::{self, ReputationProvider};
    use crate::ledger::InMemoryLedger;

    struct OfflineReputation;

    #[async_trait]
    impl ReputationProvider for OfflineReputation {
        async fn profile(&self, _subject: &str) -> collaborators::Result<ReputationProfile> {
            Err(CollaboratorError::unavailable("reputation service offline"))
        }

        async fn payout_eligibility(
            &self,
            _github_username: &str,
            _wallet: Option<&str>,
        ) -> collaborators::Result<PayoutEligibility> {
            Err(CollaboratorError::unavailable("reputation service offline"))
        }
    }

    #[tokio::test]
    async fn test_reputation_outage_is_a_collaborator_failure() {
        let tools = Tools {
            analyzer: Arc::new(StaticAnalyzer::demo()),
            ledger: Arc::new(
                InMemoryLedger::new()
                    .with_split("org/repo", "owner.near", &[("alice", 70), ("bob", 30)])
                    .with_wallet("alice", "alice.near"),
            ),
            reputation: Arc::new(OfflineReputation),
            inference: Arc::new(MockInferenceProvider::new("insight")),
            payments: PaymentOrchestrator::new(
                Arc::new(IntentsRailEngine::new(IntentsRailConfig::unconfigured(false))),
                Arc::new(NativeRailEngine::new(NativeRailConfig::unconfigured(false))),
                "NEAR",
            ),
        };
        let message = InboundMessage::new("pay 10 USDC to org/repo", "alice", Channel::Cli);
        let config = AgentConfig::default();
        let ctx = IntentContext {
            message: &message,
            mode: gitsplits_core::ExecutionMode::Execute,
            approved_plan_id: None,
            config: &config,
            now: Utc::now(),
        };

        let err = execute(10.0, "USDC", "org/repo", &ctx, &tools).await.unwrap_err();
        assert!(matches!(err, PipelineError::CollaboratorUnavailable { .. }));
        assert_eq!(err.to_string(), "❌ Payment failed: reputation service offline");
    }
}
