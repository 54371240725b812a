//! Repository contribution analyzers

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use gitsplits_core::{normalize_percentages, repo_key, repo_path, Contributor};

use crate::collaborators::{CollaboratorError, RepositoryAnalyzer, Result};

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

fn with_percentages(mut entries: Vec<(String, u64)>) -> Vec<Contributor> {
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    let commits: Vec<u64> = entries.iter().map(|(_, c)| *c).collect();
    let shares = normalize_percentages(&commits);
    entries
        .into_iter()
        .zip(shares)
        .map(|((username, commits), percentage)| Contributor {
            username,
            commits,
            percentage,
        })
        .collect()
}

// ============================================================================
// GitHub REST
// ============================================================================

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("GITHUB_API_BASE")
                .unwrap_or_else(|_| DEFAULT_GITHUB_API.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Contributor statistics from the GitHub contributors endpoint
pub struct GitHubAnalyzer {
    config: GitHubConfig,
    client: reqwest::Client,
}

impl GitHubAnalyzer {
    pub fn new(config: GitHubConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("gitsplits-agent")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(GitHubConfig::default())
    }
}

#[derive(Deserialize)]
struct GitHubContributor {
    login: String,
    contributions: u64,
}

#[async_trait]
impl RepositoryAnalyzer for GitHubAnalyzer {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn analyze(&self, repo_url: &str) -> Result<Vec<Contributor>> {
        let path = repo_path(repo_url);
        let url = format!(
            "{}/repos/{}/contributors?per_page=100",
            self.config.api_base.trim_end_matches('/'),
            path
        );

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(CollaboratorError::NotFound {
                what: format!("Repository {}", path),
            });
        }
        if status.as_u16() == 403 || status.as_u16() == 429 {
            let detail = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::RateLimited {
                message: format!("GitHub returned HTTP {}: {}", status, detail),
            });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::unavailable(format!(
                "GitHub returned HTTP {}: {}",
                status, detail
            )));
        }

        // 204 for repositories without commit history
        if status.as_u16() == 204 {
            return Ok(Vec::new());
        }

        let contributors: Vec<GitHubContributor> = response
            .json()
            .await
            .map_err(|e| {
                CollaboratorError::unavailable(format!("Unreadable GitHub response: {}", e))
            })?;

        tracing::debug!(repo = %path, count = contributors.len(), "Fetched contributors");
        Ok(with_percentages(
            contributors
                .into_iter()
                .map(|c| (c.login, c.contributions))
                .collect(),
        ))
    }
}

// ============================================================================
// Static
// ============================================================================

/// Fixed commit counts per repository
///
/// Unknown repositories analyze to an empty contributor list.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalyzer {
    repos: HashMap<String, Vec<(String, u64)>>,
}

impl StaticAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, repo: &str, commits: &[(&str, u64)]) -> Self {
        self.repos.insert(
            repo_key(repo),
            commits
                .iter()
                .map(|(user, count)| (user.to_string(), *count))
                .collect(),
        );
        self
    }

    /// Sample data for offline sessions
    pub fn demo() -> Self {
        Self::new()
            .with_repo(
                "near/near-sdk-rs",
                &[
                    ("austinabell", 412),
                    ("mikedotexe", 188),
                    ("ChaoticTempest", 121),
                    ("frol", 97),
                    ("dependabot[bot]", 40),
                    ("itegulov", 35),
                ],
            )
            .with_repo("gitsplits/demo", &[("alice", 60), ("bob", 30), ("carol", 10)])
    }
}

#[async_trait]
impl RepositoryAnalyzer for StaticAnalyzer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn analyze(&self, repo_url: &str) -> Result<Vec<Contributor>> {
        Ok(self
            .repos
            .get(&repo_key(repo_url))
            .cloned()
            .map(with_percentages)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_analyzer_orders_and_normalizes() {
        let analyzer = StaticAnalyzer::new().with_repo("Org/Repo", &[("b", 1), ("a", 2)]);
        let contributors = analyzer.analyze("https://github.com/org/repo").await.unwrap();
        assert_eq!(contributors[0].username, "a");
        assert_eq!(contributors[0].percentage, 67);
        assert_eq!(contributors.iter().map(|c| c.percentage).sum::<u32>(), 100);
    }

    #[tokio::test]
    async fn test_unknown_repo_is_empty() {
        let analyzer = StaticAnalyzer::new();
        assert!(analyzer.analyze("org/missing").await.unwrap().is_empty());
    }
}
