use gitsplits_core::PipelineError;

use super::{ExecResult, IntentOutcome, Tools};

pub(super) async fn execute(subject: &str, tools: &Tools) -> ExecResult {
    let subject = subject.trim().trim_start_matches('@');
    let profile = tools
        .reputation
        .profile(subject)
        .await
        .map_err(|e| PipelineError::collaborator("Reputation lookup failed", e))?;

    Ok(IntentOutcome::reply(format!(
        "🏅 Reputation for @{}\n\nKind: {}\nScore: {}/100 ({})\nSources: {}",
        subject,
        profile.kind,
        profile.score,
        profile.tier,
        profile.sources.join(", ")
    )))
}
