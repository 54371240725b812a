use futures::future::join_all;

use gitsplits_core::{
    is_near_account, is_system_contributor, normalize_repo_url, repo_path, Allocation, Contributor,
    PipelineError, SplitContributor,
};

use super::{list_with_overflow, ExecResult, IntentContext, IntentOutcome, Tools};
use crate::collaborators::CollaboratorError;
use crate::state::{SplitSnapshot, StateUpdate};

const FAILURE: &str = "Failed to create split";

pub(super) async fn execute(
    repo: &str,
    allocation: &Allocation,
    ctx: &IntentContext<'_>,
    tools: &Tools,
) -> ExecResult {
    let repo_url = normalize_repo_url(repo);
    let failed = |e: CollaboratorError| PipelineError::collaborator(FAILURE, e);

    let existing = tools.ledger.get_split(&repo_url).await.map_err(failed)?;
    let contributors = tools.analyzer.analyze(&repo_url).await.map_err(failed)?;
    if contributors.is_empty() {
        return Ok(IntentOutcome::reply(format!(
            "No contributors found for {}. Make sure it's a public repository.",
            repo_url
        )));
    }

    let shares = allocate(&contributors, allocation)?;
    let split = match &existing {
        Some(split) => tools.ledger.update_split(&split.id, shares).await,
        None => {
            let owner = resolve_owner(ctx)?;
            tools.ledger.create_split(&repo_url, &owner, shares).await
        }
    }
    .map_err(failed)?;

    let eligible: Vec<&SplitContributor> = split
        .contributors
        .iter()
        .filter(|c| !is_system_contributor(&c.github_username))
        .collect();
    let skipped = split.contributors.len() - eligible.len();
    let wallets = join_all(
        eligible
            .iter()
            .map(|c| tools.ledger.verified_wallet(&c.github_username)),
    )
    .await;
    let mut unverified = Vec::new();
    for (contributor, wallet) in eligible.iter().zip(wallets) {
        if wallet.map_err(failed)?.is_none() {
            unverified.push(format!("@{}", contributor.github_username));
        }
    }
    let verified = eligible.len() - unverified.len();

    let action = if existing.is_some() { "updated" } else { "created" };
    let mut response = format!(
        "✅ Split {} for {}!\n\n📜 Split ID: {}\n\nTop contributors (verified via Git history):\n{}",
        action,
        repo_url,
        split.id,
        split
            .contributors
            .iter()
            .take(5)
            .map(|c| format!("- {}: {}%", c.github_username, c.percentage))
            .collect::<Vec<_>>()
            .join("\n")
    );
    if split.contributors.len() > 5 {
        response.push_str(&format!("\n...and {} more", split.contributors.len() - 5));
    }

    response.push_str(&format!(
        "\n\nVerification coverage: {}/{} verified",
        verified,
        eligible.len()
    ));
    if skipped > 0 {
        response.push_str(&format!(" ({} bot/system skipped)", skipped));
    }
    if !unverified.is_empty() {
        response.push_str(&format!(
            "\nNeed verification: {}",
            list_with_overflow(&unverified, 5)
        ));
        response.push_str(&format!(
            "\nInvite link: {}?repo={}",
            ctx.config.verify_base_url,
            urlencoding::encode(&repo_path(&repo_url))
        ));
    }

    response.push_str(&format!("\n\nTo pay them: \"@gitsplits pay 100 USDC to {}\"", repo_url));
    if existing.is_some() {
        response.push_str("\n\nThis split was refreshed with the latest contributors.");
    }

    Ok(IntentOutcome::with_update(
        response,
        StateUpdate {
            last_split: Some(SplitSnapshot {
                id: split.id,
                repo_url,
                created_at: ctx.now,
            }),
            ..StateUpdate::default()
        },
    ))
}

/// Analysis percentages, or custom shares applied to top contributors in order
fn allocate(
    contributors: &[Contributor],
    allocation: &Allocation,
) -> Result<Vec<SplitContributor>, PipelineError> {
    match allocation {
        Allocation::Default => Ok(contributors
            .iter()
            .map(|c| SplitContributor {
                github_username: c.username.clone(),
                percentage: c.percentage,
            })
            .collect()),
        Allocation::Custom(shares) => {
            if shares.len() > contributors.len() {
                return Err(PipelineError::validation(format!(
                    "Allocation has {} shares but only {} contributors were found",
                    shares.len(),
                    contributors.len()
                )));
            }
            Ok(contributors
                .iter()
                .zip(shares)
                .map(|(c, share)| SplitContributor {
                    github_username: c.username.clone(),
                    percentage: *share,
                })
                .collect())
        }
    }
}

/// Wallet on the message, then the author, then the configured owner
fn resolve_owner(ctx: &IntentContext<'_>) -> Result<String, PipelineError> {
    let message = ctx.message;
    [
        message.near_account_id.as_deref(),
        message.wallet_address.as_deref(),
        Some(message.author.as_str()),
    ]
    .into_iter()
    .flatten()
    .find(|candidate| is_near_account(candidate))
    .map(str::to_string)
    .or_else(|| ctx.config.owner_account.clone())
    .ok_or_else(|| {
        PipelineError::collaborator(
            FAILURE,
            "No valid NEAR owner account available. Connect a NEAR wallet in web UI or set NEAR_ACCOUNT_ID.",
        )
    })
}
