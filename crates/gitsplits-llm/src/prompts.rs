//! Prompt templates used by the agent

use crate::types::{ChatOptions, Message};

/// Prompt templates for classification and contribution insight
pub struct AgentPrompts;

impl AgentPrompts {
    /// System prompt for the assisted intent classifier
    pub fn classifier_system_prompt() -> String {
        "Classify user requests for a GitHub contributor payout agent. \
Return strict JSON only with keys: intentName, params, confidence, outcomes, rationale. \
intentName must be one of: analyze, create, pay, verify, pending. \
Normalize repo to github.com/owner/repo when possible."
            .to_string()
    }

    pub fn classifier_messages(text: &str) -> Vec<Message> {
        vec![
            Message::system(Self::classifier_system_prompt()),
            Message::user(text),
        ]
    }

    pub fn classifier_options() -> ChatOptions {
        ChatOptions::new().with_max_tokens(220).with_temperature(0.1)
    }

    /// Fairness review of a contribution breakdown
    ///
    /// `contributor_lines` is one `- user: N commits (P%)` line per contributor.
    pub fn fairness_messages(repo_url: &str, contributor_lines: &str) -> Vec<Message> {
        vec![
            Message::system(
                "You are a fair and objective analyst of open source contributions. \
Assess the contribution percentages and suggest adjustments if needed. \
Return only a concise user-facing summary. Do not output chain-of-thought, \
internal reasoning, scratch work, or hidden analysis.",
            ),
            Message::user(format!(
                "Analyze the following contribution breakdown for the repository {}:\n\n{}\n\n\
Are these percentages fair based on the commit distribution? \
Suggest any adjustments and explain your reasoning.",
                repo_url, contributor_lines
            )),
        ]
    }

    pub fn fairness_options() -> ChatOptions {
        ChatOptions::new().with_temperature(0.3)
    }

    /// Deterministic insight used when the model reply is unusable
    pub fn fallback_insight(commits: &[u64]) -> String {
        let total: u64 = commits.iter().sum();
        let top3: u64 = commits.iter().take(3).sum();
        let concentration = if total > 0 {
            ((top3 as f64 / total as f64) * 100.0).round() as u64
        } else {
            0
        };
        format!(
            "Top contributors account for about {}% of commits among the sampled set. \
Commit count suggests concentration, but final payout weights should also consider review load, \
maintenance work, and architectural impact.",
            concentration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;

    #[test]
    fn test_classifier_prompt_names_closed_set() {
        let messages = AgentPrompts::classifier_messages("pay the team");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("analyze, create, pay, verify, pending"));
        assert_eq!(messages[1].content, "pay the team");
        assert_eq!(AgentPrompts::classifier_options().max_tokens, Some(220));
    }

    #[test]
    fn test_fallback_insight_concentration() {
        let text = AgentPrompts::fallback_insight(&[50, 30, 10, 10]);
        assert!(text.starts_with("Top contributors account for about 90% of commits"));
        assert!(AgentPrompts::fallback_insight(&[]).contains("about 0%"));
    }
}
