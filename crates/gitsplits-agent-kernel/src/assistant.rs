//! Assisted intent classification for hands-off mode
//!
//! Tries the inference provider first (through the guard) and falls back to
//! keyword heuristics on any failure. The result only ever proposes an
//! intent; it goes through the same policy gate and plan rules as a
//! deterministic match.

use regex::Regex;
use std::sync::{Arc, LazyLock};

use gitsplits_core::{Allocation, IntentName, IntentParams, ResolutionSource, ResolvedIntent};
use gitsplits_guard::Guard;
use gitsplits_llm::{sanitize_content, AgentPrompts, InferenceProvider};

static REPO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:github\.com/)?([a-zA-Z0-9_.-]+/[a-zA-Z0-9_.-]+)").expect("valid repo regex")
});

static PAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:pay|send|distribute)\s+(\d+(?:\.\d+)?)\s*([a-zA-Z0-9]+)?")
        .expect("valid pay regex")
});

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z0-9_.\-\[\]]+)").expect("valid mention regex"));

/// An intent proposed by the assistant
#[derive(Debug, Clone, PartialEq)]
pub struct AssistedIntent {
    pub params: IntentParams,
    pub confidence: f64,
    pub outcomes: Vec<String>,
    pub rationale: String,
    pub source: ResolutionSource,
}

impl AssistedIntent {
    pub fn intent(&self) -> IntentName {
        self.params.intent()
    }

    pub fn to_resolved(&self) -> ResolvedIntent {
        ResolvedIntent {
            params: self.params.clone(),
            confidence: self.confidence,
            source: self.source,
        }
    }
}

fn heuristic(
    params: IntentParams,
    confidence: f64,
    outcomes: &[&str],
    rationale: &str,
) -> Option<AssistedIntent> {
    Some(AssistedIntent {
        params,
        confidence,
        outcomes: outcomes.iter().map(|o| o.to_string()).collect(),
        rationale: rationale.to_string(),
        source: ResolutionSource::Heuristic,
    })
}

/// Keyword heuristics over free text
pub fn heuristic_assist(text: &str) -> Option<AssistedIntent> {
    let lower = text.to_lowercase();
    let repo = REPO_RE
        .captures(text)
        .map(|caps| format!("github.com/{}", &caps[1]));

    if let Some(repo) = &repo {
        if lower.contains("analy") || lower.contains("contributor") {
            return heuristic(
                IntentParams::Analyze { repo: repo.clone() },
                0.72,
                &[
                    "Fetch contributor history",
                    "Compute verification coverage",
                    "Propose next split action",
                ],
                "Detected repository analysis intent.",
            );
        }

        if lower.contains("create") || lower.contains("split") || lower.contains("distribution") {
            return heuristic(
                IntentParams::Create {
                    repo: repo.clone(),
                    allocation: Allocation::Default,
                },
                0.69,
                &[
                    "Create/refresh split",
                    "Map contributors to percentages",
                    "Report verification gaps",
                ],
                "Detected split creation intent.",
            );
        }

        if let Some(caps) = PAY_RE.captures(text) {
            if let Ok(amount) = caps[1].parse::<f64>() {
                let token = caps
                    .get(2)
                    .map(|t| t.as_str().to_uppercase())
                    .filter(|t| t != "TO")
                    .unwrap_or_else(|| "NEAR".to_string());
                return heuristic(
                    IntentParams::Pay {
                        amount,
                        token,
                        repo: repo.clone(),
                    },
                    0.70,
                    &[
                        "Validate verified recipients",
                        "Apply payout policy",
                        "Execute payment via configured engine",
                    ],
                    "Detected payment intent with amount and repository.",
                );
            }
        }
    }

    let mention = MENTION_RE.captures(text).map(|caps| caps[1].to_string());
    if (lower.contains("verify") || lower.contains("link wallet"))
        && (repo.is_some() || mention.is_some())
    {
        let github_username = if repo.is_some() { None } else { mention };
        return heuristic(
            IntentParams::Verify {
                repo: repo.clone(),
                github_username,
            },
            0.62,
            &[
                "Check current verification coverage",
                "Generate verification links",
                "Suggest outreach artifacts",
            ],
            "Detected verification-related request.",
        );
    }

    if let Some(repo) = repo {
        if lower.contains("pending") {
            return heuristic(
                IntentParams::Pending { target: repo },
                0.65,
                &["Fetch pending claims by contributor", "Summarize blocked payouts"],
                "Detected pending claims request.",
            );
        }
    }

    None
}

/// Inference-backed classifier with a heuristic fallback
#[derive(Clone, Default)]
pub struct IntentAssistant {
    inference: Option<Arc<dyn InferenceProvider>>,
    guard: Arc<Guard>,
}

impl IntentAssistant {
    pub fn new(inference: Option<Arc<dyn InferenceProvider>>) -> Self {
        Self {
            inference,
            guard: Arc::new(Guard::new()),
        }
    }

    pub async fn assist(&self, text: &str) -> Option<AssistedIntent> {
        let Some(inference) = &self.inference else {
            return heuristic_assist(text);
        };

        let completion = match inference
            .chat(
                AgentPrompts::classifier_messages(text),
                AgentPrompts::classifier_options(),
            )
            .await
        {
            Ok(completion) => completion,
            Err(err) => {
                tracing::debug!(error = %err, "Classifier unavailable, using heuristics");
                return heuristic_assist(text);
            }
        };

        match self
            .guard
            .parse_classification(&sanitize_content(&completion.content))
        {
            Ok(classification) => Some(AssistedIntent {
                params: classification.params,
                confidence: classification.confidence,
                outcomes: classification.outcomes,
                rationale: classification.rationale,
                source: ResolutionSource::Llm,
            }),
            Err(err) => {
                tracing::debug!(error = %err, "Classifier reply rejected, using heuristics");
                heuristic_assist(text)
            }
        }
    }
}

/// Show an assisted interpretation without acting on it
pub fn format_assisted_suggestion(suggestion: &AssistedIntent) -> String {
    let outcomes: Vec<String> = suggestion
        .outcomes
        .iter()
        .map(|o| format!("- {}", o))
        .collect();
    format!(
        "🤖 Hands-off intent interpretation ({}, confidence {:.2}).\nIntent: {}\nRationale: {}\n\nSuggested outcomes:\n{}",
        suggestion.source,
        suggestion.confidence,
        suggestion.intent(),
        suggestion.rationale,
        outcomes.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsplits_llm::MockInferenceProvider;

    #[test]
    fn test_heuristic_analyze() {
        let text = "can you look at the contributors of thisyearnofear/gitsplits?";
        let assisted = heuristic_assist(text).unwrap();
        assert_eq!(
            assisted.params,
            IntentParams::Analyze {
                repo: "github.com/thisyearnofear/gitsplits".to_string()
            }
        );
        assert_eq!(assisted.confidence, 0.72);
        assert_eq!(assisted.source, ResolutionSource::Heuristic);
    }

    #[test]
    fn test_heuristic_pay_defaults_to_near() {
        let assisted = heuristic_assist("send 5 to org/repo").unwrap();
        assert_eq!(
            assisted.params,
            IntentParams::Pay {
                amount: 5.0,
                token: "NEAR".to_string(),
                repo: "github.com/org/repo".to_string(),
            }
        );
    }

    #[test]
    fn test_heuristic_verify_mention() {
        let assisted = heuristic_assist("please verify @alice").unwrap();
        assert_eq!(
            assisted.params,
            IntentParams::Verify {
                repo: None,
                github_username: Some("alice".to_string()),
            }
        );
        assert!(heuristic_assist("hello there").is_none());
    }

    #[tokio::test]
    async fn test_llm_classification_preferred() {
        let provider = Arc::new(MockInferenceProvider::new(
            r#"{"intentName":"pending","params":{"target":"github.com/org/repo"},"confidence":0.8,"outcomes":["List claims"],"rationale":"Asked about claims."}"#,
        ));
        let assistant = IntentAssistant::new(Some(provider.clone()));
        let assisted = assistant.assist("anything owed on org/repo?").await.unwrap();
        assert_eq!(assisted.source, ResolutionSource::Llm);
        assert_eq!(assisted.intent(), IntentName::Pending);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let assistant =
            IntentAssistant::new(Some(Arc::new(MockInferenceProvider::failing("offline"))));
        let assisted = assistant.assist("analysis of org/repo please").await.unwrap();
        assert_eq!(assisted.source, ResolutionSource::Heuristic);

        let assistant =
            IntentAssistant::new(Some(Arc::new(MockInferenceProvider::new("not json"))));
        let assisted = assistant.assist("analysis of org/repo please").await.unwrap();
        assert_eq!(assisted.source, ResolutionSource::Heuristic);
    }

    #[test]
    fn test_format_suggestion() {
        let assisted = heuristic_assist("pending for org/repo").unwrap();
        let text = format_assisted_suggestion(&assisted);
        assert!(text.starts_with("🤖 Hands-off intent interpretation (heuristic, confidence 0.65)."));
        assert!(text.contains("Intent: pending"));
        assert!(text.ends_with("- Summarize blocked payouts"));
    }
}
