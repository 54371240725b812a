use chrono::Duration;
use futures::future::join_all;
use rand::distributions::Alphanumeric;
use rand::Rng;

use gitsplits_core::{
    is_near_account, is_system_contributor, normalize_repo_url, repo_path, Channel, Contributor,
    PendingVerification, PipelineError,
};

use super::{list_with_overflow, ExecResult, IntentContext, IntentOutcome, Tools};
use crate::collaborators::CollaboratorError;
use crate::state::{CoverageSnapshot, StateUpdate, VerificationSnapshot};

const FAILURE: &str = "Verification failed";
const SAMPLED: usize = 15;
const SHOWN: usize = 5;
const CODE_TTL_HOURS: i64 = 24;

pub(super) async fn execute(
    repo: Option<&str>,
    github_username: Option<&str>,
    ctx: &IntentContext<'_>,
    tools: &Tools,
) -> ExecResult {
    match (repo.filter(|r| !r.trim().is_empty()), github_username) {
        (Some(repo), _) => repository_coverage(repo, ctx, tools).await,
        (None, Some(user)) => verify_user(user.trim_start_matches('@'), ctx, tools).await,
        (None, None) => Err(PipelineError::validation(
            "GitHub username or repository is required",
        )),
    }
}

fn failed(e: CollaboratorError) -> PipelineError {
    PipelineError::collaborator(FAILURE, e)
}

/// Verification status of a repository's top contributors
async fn repository_coverage(repo: &str, ctx: &IntentContext<'_>, tools: &Tools) -> ExecResult {
    let repo_url = normalize_repo_url(repo);
    let contributors = tools.analyzer.analyze(&repo_url).await.map_err(failed)?;
    if contributors.is_empty() {
        return Ok(IntentOutcome::reply(format!(
            "No contributors found for {}.",
            repo_url
        )));
    }

    let sample = &contributors[..contributors.len().min(SAMPLED)];
    let (bots, humans): (Vec<&Contributor>, Vec<&Contributor>) = sample
        .iter()
        .partition(|c| is_system_contributor(&c.username));

    let wallets = join_all(
        humans
            .iter()
            .map(|c| tools.ledger.verified_wallet(&c.username)),
    )
    .await;
    let mut verified = Vec::new();
    let mut unverified = Vec::new();
    for (contributor, wallet) in humans.iter().zip(wallets) {
        match wallet.map_err(failed)? {
            Some(wallet) => verified.push((contributor.username.as_str(), wallet)),
            None => unverified.push(contributor.username.as_str()),
        }
    }

    let mut response = format!(
        "🔎 Verification status for {}\n\nCoverage (top {} contributors): {} verified, {} unverified",
        repo_url,
        sample.len(),
        verified.len(),
        unverified.len()
    );
    if !bots.is_empty() {
        response.push_str(&format!(", {} skipped", bots.len()));
        let names: Vec<String> = bots.iter().map(|c| format!("@{}", c.username)).collect();
        response.push_str(&format!(
            "\nSkipped bot/system accounts: {}",
            list_with_overflow(&names, 4)
        ));
    }

    response.push_str("\n\nReady to receive payouts:\n");
    if verified.is_empty() {
        response.push_str("None yet");
    } else {
        let lines: Vec<String> = verified
            .iter()
            .take(SHOWN)
            .map(|(user, wallet)| format!("✅ @{} -> {}", user, wallet))
            .collect();
        response.push_str(&lines.join("\n"));
        if verified.len() > SHOWN {
            response.push_str(&format!("\n...and {} more verified", verified.len() - SHOWN));
        }
    }

    let path = urlencoding::encode(&repo_path(&repo_url)).into_owned();
    response.push_str("\n\nNeed verification:\n");
    if unverified.is_empty() {
        response.push_str("None");
    } else {
        let lines: Vec<String> = unverified
            .iter()
            .take(SHOWN)
            .map(|user| {
                format!(
                    "• @{}: {}?repo={}&user={}",
                    user,
                    ctx.config.verify_base_url,
                    path,
                    urlencoding::encode(user)
                )
            })
            .collect();
        response.push_str(&lines.join("\n"));
        if unverified.len() > SHOWN {
            response.push_str(&format!("\n...and {} more unverified", unverified.len() - SHOWN));
        }
    }

    if unverified.is_empty() {
        response.push_str(&format!(
            "\n\nNext: everyone checked is verified. You can safely run: pay <amount> <token> to {}",
            repo_path(&repo_url)
        ));
    } else {
        response.push_str("\n\nNext: share the links above with unverified contributors.");
    }

    Ok(IntentOutcome::with_update(
        response,
        StateUpdate {
            last_verification_coverage: Some(CoverageSnapshot {
                repo_url,
                checked: sample.len(),
                verified: verified.len(),
                unverified: unverified.len(),
                skipped: bots.len(),
                timestamp: ctx.now,
            }),
            ..StateUpdate::default()
        },
    ))
}

/// Link a user's wallet, or start a gist-based verification
async fn verify_user(user: &str, ctx: &IntentContext<'_>, tools: &Tools) -> ExecResult {
    if let Some(wallet) = tools.ledger.verified_wallet(user).await.map_err(failed)? {
        return Ok(IntentOutcome::reply(format!(
            "@{} is already verified! You can receive payments to {}.",
            user, wallet
        )));
    }

    let message = ctx.message;
    let near_wallet = message
        .near_account_id
        .clone()
        .or_else(|| {
            message
                .wallet_address
                .clone()
                .filter(|w| is_near_account(w))
        });

    if let (Channel::Web, Some(wallet)) = (message.channel, near_wallet) {
        let profile = tools.reputation.profile(user).await.map_err(failed)?;
        tools
            .ledger
            .store_verification(user, &wallet, &message.author)
            .await
            .map_err(failed)?;
        return Ok(IntentOutcome::with_update(
            format!(
                "✅ @{} verified and linked to {}.\n🏅 Reputation: {}/100 ({})",
                user, wallet, profile.score, profile.tier
            ),
            StateUpdate {
                last_verification: Some(VerificationSnapshot {
                    github_username: user.to_string(),
                    wallet,
                    verified_at: ctx.now,
                }),
                ..StateUpdate::default()
            },
        ));
    }

    let pending = PendingVerification {
        github_username: user.to_string(),
        requested_by: message.author.clone(),
        code: verification_code(),
        expires_at: ctx.now + Duration::hours(CODE_TTL_HOURS),
    };
    tools
        .ledger
        .store_pending_verification(pending.clone())
        .await
        .map_err(failed)?;

    let response = format!(
        "🔐 Verification initiated for @{}\n\nTo complete:\n1. Create a public GitHub gist\n2. Paste this code: {}\n3. Reply here with the gist URL\n\nOr verify at: {}?github={}&code={}",
        user,
        pending.code,
        ctx.config.verify_base_url,
        urlencoding::encode(user),
        pending.code
    );
    Ok(IntentOutcome::with_update(
        response,
        StateUpdate {
            pending_verification: Some(pending),
            ..StateUpdate::default()
        },
    ))
}

fn verification_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("gitsplits-verify-{}", suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_code_shape() {
        let code = verification_code();
        assert!(code.starts_with("gitsplits-verify-"));
        assert_eq!(code.len(), "gitsplits-verify-".len() + 8);
        assert_ne!(code, verification_code());
    }
}
