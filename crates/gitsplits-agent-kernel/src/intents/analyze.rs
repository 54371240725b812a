use futures::future::join_all;

use gitsplits_core::{is_system_contributor, normalize_repo_url, Contributor, PipelineError};
use gitsplits_llm::{
    is_low_signal_output, looks_like_internal_reasoning, sanitize_content, AgentPrompts,
};

use super::{ExecResult, IntentContext, IntentOutcome, Tools};
use crate::state::{AnalysisSnapshot, StateUpdate};

const PROOF_EXPLORER: &str = "https://determinal.eigenarcade.com/verify";
const SHOWN: usize = 5;
const SAMPLED: usize = 10;

pub(super) async fn execute(repo: &str, ctx: &IntentContext<'_>, tools: &Tools) -> ExecResult {
    let repo_url = normalize_repo_url(repo);
    let contributors = tools
        .analyzer
        .analyze(&repo_url)
        .await
        .map_err(|e| PipelineError::collaborator(format!("Analysis failed for {}", repo), e))?;

    if contributors.is_empty() {
        return Ok(IntentOutcome::reply(format!(
            "No contributors found for {}. Make sure it's a public repository with commit history.",
            repo_url
        )));
    }

    let total_commits: u64 = contributors.iter().map(|c| c.commits).sum();
    let mut response = format!(
        "📊 Analysis for {}\n\nTotal commits: {}\nContributors: {}\n\nTop contributors:\n{}",
        repo_url,
        total_commits,
        contributors.len(),
        top_lines(&contributors)
    );
    if contributors.len() > SHOWN {
        response.push_str(&format!("\n...and {} more", contributors.len() - SHOWN));
    }

    let sample = &contributors[..contributors.len().min(SAMPLED)];
    if let Some(coverage) = coverage_line(sample, ctx, tools).await {
        response.push_str(&coverage);
    }
    if let Some(insight) = insight(&repo_url, sample, tools).await {
        response.push_str(&insight);
    }

    response.push_str(&format!("\n\nCreate a split: \"@gitsplits create {}\"", repo_url));

    Ok(IntentOutcome::with_update(
        response,
        StateUpdate {
            last_analysis: Some(AnalysisSnapshot {
                repo_url,
                contributors,
                timestamp: ctx.now,
            }),
            ..StateUpdate::default()
        },
    ))
}

fn top_lines(contributors: &[Contributor]) -> String {
    contributors
        .iter()
        .take(SHOWN)
        .enumerate()
        .map(|(i, c)| {
            let medal = match i {
                0 => "🥇",
                1 => "🥈",
                2 => "🥉",
                _ => "•",
            };
            format!("{} {}: {} commits ({}%)", medal, c.username, c.commits, c.percentage)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verified share of the sampled contributors; skipped on lookup failure
async fn coverage_line(
    sample: &[Contributor],
    ctx: &IntentContext<'_>,
    tools: &Tools,
) -> Option<String> {
    let eligible: Vec<&Contributor> = sample
        .iter()
        .filter(|c| !is_system_contributor(&c.username))
        .collect();
    let skipped = sample.len() - eligible.len();

    let lookups = join_all(
        eligible
            .iter()
            .map(|c| tools.ledger.verified_wallet(&c.username)),
    )
    .await;

    let mut verified = 0;
    for lookup in lookups {
        match lookup {
            Ok(Some(_)) => verified += 1,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Skipping verification coverage");
                return None;
            }
        }
    }

    let mut line = format!(
        "\n\n✅ Verification coverage (top {}): {}/{} verified",
        sample.len(),
        verified,
        eligible.len()
    );
    if skipped > 0 {
        line.push_str(&format!(" ({} bot/system skipped)", skipped));
    }
    line.push_str(&format!(
        "\nInvite unverified contributors: {}",
        ctx.config.verify_base_url
    ));
    Some(line)
}

/// Signed fairness note from the inference provider
async fn insight(repo_url: &str, sample: &[Contributor], tools: &Tools) -> Option<String> {
    let lines = sample
        .iter()
        .map(|c| format!("- {}: {} commits ({}%)", c.username, c.commits, c.percentage))
        .collect::<Vec<_>>()
        .join("\n");

    let completion = match tools
        .inference
        .chat(
            AgentPrompts::fairness_messages(repo_url, &lines),
            AgentPrompts::fairness_options(),
        )
        .await
    {
        Ok(completion) => completion,
        Err(err) => {
            tracing::warn!(provider = tools.inference.name(), error = %err, "Skipping AI insight");
            return None;
        }
    };

    let sanitized = sanitize_content(&completion.content);
    let text = if completion.mock {
        sanitized
    } else if looks_like_internal_reasoning(&sanitized) || is_low_signal_output(&sanitized) {
        let commits: Vec<u64> = sample.iter().map(|c| c.commits).collect();
        AgentPrompts::fallback_insight(&commits)
    } else {
        sanitized
    };
    if text.is_empty() {
        return None;
    }

    let mut block = format!("\n\n🛡️ Verifiable AI Insight:\n{}", text);
    if let Some(signature) = &completion.signature {
        block.push_str(&format!("\n🔗 Proof: {}/{}", PROOF_EXPLORER, signature));
    }
    Some(block)
}
