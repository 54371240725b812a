use gitsplits_core::{looks_like_repo, normalize_repo_url, PendingClaim, PipelineError};

use super::{ExecResult, IntentContext, IntentOutcome, Tools};
use crate::collaborators::CollaboratorError;

const MAX_LINES: usize = 10;

fn failed(e: CollaboratorError) -> PipelineError {
    PipelineError::collaborator("Failed to fetch pending claims", e)
}

pub(super) async fn execute(target: &str, ctx: &IntentContext<'_>, tools: &Tools) -> ExecResult {
    if looks_like_repo(target) {
        repository_claims(target, ctx, tools).await
    } else {
        user_claims(target.trim_start_matches('@'), tools).await
    }
}

async fn repository_claims(target: &str, ctx: &IntentContext<'_>, tools: &Tools) -> ExecResult {
    let repo_url = normalize_repo_url(target);
    let Some(split) = tools.ledger.get_split(&repo_url).await.map_err(failed)? else {
        return Ok(IntentOutcome::reply(format!("No split found for {}.", repo_url)));
    };

    let mut rows = Vec::new();
    let mut entries = 0;
    for contributor in &split.contributors {
        let claims = tools
            .ledger
            .pending_claims(&contributor.github_username)
            .await
            .map_err(failed)?;
        if claims.is_empty() {
            continue;
        }
        entries += claims.len();
        rows.push(format!(
            "- {}: {} claim(s), {}",
            contributor.github_username,
            claims.len(),
            totals_by_token(&claims)
        ));
    }

    if rows.is_empty() {
        return Ok(IntentOutcome::reply(format!("No pending claims for {}.", repo_url)));
    }

    let shown: Vec<&str> = rows.iter().take(MAX_LINES).map(String::as_str).collect();
    Ok(IntentOutcome::reply(format!(
        "⏳ Pending claims for {}\n\nContributors with pending claims: {}\nTotal pending claim entries: {}\n\n{}\n\nAsk contributors to verify at {}",
        repo_url,
        rows.len(),
        entries,
        shown.join("\n"),
        ctx.config.verify_base_url
    )))
}

/// `5 USDC + 2 NEAR`, tokens in first-seen order
fn totals_by_token(claims: &[PendingClaim]) -> String {
    let mut totals: Vec<(&str, f64)> = Vec::new();
    for claim in claims {
        match totals.iter_mut().find(|(token, _)| *token == claim.token) {
            Some((_, total)) => *total += claim.amount,
            None => totals.push((claim.token.as_str(), claim.amount)),
        }
    }
    totals
        .iter()
        .map(|(token, total)| format!("{} {}", total, token))
        .collect::<Vec<_>>()
        .join(" + ")
}

async fn user_claims(user: &str, tools: &Tools) -> ExecResult {
    let claims = tools.ledger.pending_claims(user).await.map_err(failed)?;
    if claims.is_empty() {
        return Ok(IntentOutcome::reply(format!(
            "No pending claims found for @{}.",
            user
        )));
    }
    let lines: Vec<String> = claims
        .iter()
        .take(MAX_LINES)
        .map(|c| format!("- {}: {} {}", c.id, c.amount, c.token))
        .collect();
    Ok(IntentOutcome::reply(format!(
        "⏳ Pending claims for @{}\n\nCount: {}\n{}",
        user,
        claims.len(),
        lines.join("\n")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SplitLedger;
    use crate::ledger::InMemoryLedger;

    #[tokio::test]
    async fn test_totals_are_kept_per_token() {
        let ledger = InMemoryLedger::new();
        ledger.store_pending_claim("carol", 5.0, "USDC").await.unwrap();
        ledger.store_pending_claim("carol", 2.0, "NEAR").await.unwrap();
        ledger.store_pending_claim("carol", 1.5, "USDC").await.unwrap();

        let claims = ledger.pending_claims("carol").await.unwrap();
        assert_eq!(totals_by_token(&claims), "6.5 USDC + 2 NEAR");
    }
}
