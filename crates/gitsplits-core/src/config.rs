//! Runtime configuration for the agent
//!
//! Built once at startup and handed to the pipeline by reference. Nothing in
//! the pipeline reads the environment after construction.

use chrono::Duration;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::repo::repo_key;
use crate::types::ExecutionMode;

pub const DEFAULT_PLAN_TTL_MS: i64 = 10 * 60 * 1000;
pub const DEFAULT_REPLAY_CAPACITY: usize = 500;
pub const DEFAULT_REPLAY_TTL_HOURS: i64 = 24;
pub const TELEMETRY_FILE_NAME: &str = "agent-events.ndjson";

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Production mode disables mock collaborators
    pub production: bool,
    /// Mode for users who never issued `mode ...`
    pub default_execution_mode: ExecutionMode,
    /// Below this, a resolution is treated as low confidence
    pub min_parse_confidence: f64,
    /// Hands-off mode only accepts assisted results at or above this
    pub hands_off_min_confidence: f64,
    pub plan_ttl: Duration,
    /// Tokens the policy gate accepts for `pay` (uppercase)
    pub allowed_tokens: Vec<String>,
    pub max_payout_amount: f64,
    /// Always plan `create`/`pay`, regardless of execution mode
    pub require_approval: bool,
    pub canary_only_pay: bool,
    /// Repository keys (`owner/name`, lowercase) allowed under canary mode
    pub canary_repos: Vec<String>,
    /// Let the assisted classifier call the inference provider
    pub assist_with_inference: bool,
    /// Token that routes payouts to the chain-native rail
    pub native_token: String,
    pub replay_capacity: usize,
    pub replay_ttl: Duration,
    /// NDJSON event log; `None` keeps events in memory only
    pub telemetry_path: Option<PathBuf>,
    pub verify_base_url: String,
    /// Fallback split owner when the message carries no NEAR account
    pub owner_account: Option<String>,
    pub reputation_min_score: u8,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            production: false,
            default_execution_mode: ExecutionMode::Execute,
            min_parse_confidence: 0.45,
            hands_off_min_confidence: 0.65,
            plan_ttl: Duration::milliseconds(DEFAULT_PLAN_TTL_MS),
            allowed_tokens: vec!["NEAR".to_string(), "USDC".to_string()],
            max_payout_amount: 250.0,
            require_approval: false,
            canary_only_pay: false,
            canary_repos: Vec::new(),
            assist_with_inference: true,
            native_token: "NEAR".to_string(),
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            replay_ttl: Duration::hours(DEFAULT_REPLAY_TTL_HOURS),
            telemetry_path: None,
            verify_base_url: "https://gitsplits.xyz/verify".to_string(),
            owner_account: None,
            reputation_min_score: 50,
        }
    }
}

impl AgentConfig {
    /// Load from the process environment (and `.env`, if present)
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_dir = get("AGENT_LOG_DIR").unwrap_or_else(|| "runtime_logs".to_string());
        let web_base = get("WEB_APP_BASE_URL")
            .map(|base| format!("{}/verify", base.trim_end_matches('/')))
            .unwrap_or(defaults.verify_base_url);

        Self {
            production: get("AGENT_MODE").as_deref() == Some("production"),
            default_execution_mode: get("AGENT_DEFAULT_EXEC_MODE")
                .and_then(|m| ExecutionMode::parse(&m))
                .unwrap_or(defaults.default_execution_mode),
            min_parse_confidence: parse_or(
                &get,
                "AGENT_MIN_PARSE_CONFIDENCE",
                defaults.min_parse_confidence,
            ),
            hands_off_min_confidence: parse_or(
                &get,
                "AGENT_HANDS_OFF_MIN_CONFIDENCE",
                defaults.hands_off_min_confidence,
            ),
            plan_ttl: Duration::milliseconds(parse_or(
                &get,
                "AGENT_PLAN_TTL_MS",
                DEFAULT_PLAN_TTL_MS,
            )),
            allowed_tokens: get("AGENT_ALLOWED_TOKENS")
                .map(|list| split_list(&list).map(|t| t.to_uppercase()).collect())
                .unwrap_or(defaults.allowed_tokens),
            max_payout_amount: parse_or(
                &get,
                "AGENT_MAX_PAYOUT_AMOUNT",
                defaults.max_payout_amount,
            ),
            require_approval: get("AGENT_REQUIRE_APPROVAL").as_deref() == Some("true"),
            canary_only_pay: get("AGENT_CANARY_ONLY_PAY").as_deref() == Some("true"),
            canary_repos: get("TEST_CANARY_REPOS")
                .map(|list| split_list(&list).map(repo_key).collect())
                .unwrap_or_default(),
            assist_with_inference: get("AGENT_ASSIST_USE_LLM").as_deref() != Some("false"),
            native_token: get("AGENT_NATIVE_TOKEN")
                .map(|t| t.to_uppercase())
                .unwrap_or(defaults.native_token),
            replay_capacity: parse_or(&get, "AGENT_REPLAY_CAPACITY", defaults.replay_capacity),
            replay_ttl: defaults.replay_ttl,
            telemetry_path: Some(PathBuf::from(log_dir).join(TELEMETRY_FILE_NAME)),
            verify_base_url: web_base,
            owner_account: get("NEAR_ACCOUNT_ID"),
            reputation_min_score: parse_or(
                &get,
                "REPUTATION_MIN_PAYOUT_SCORE",
                defaults.reputation_min_score,
            ),
        }
    }

    pub fn is_token_allowed(&self, token: &str) -> bool {
        let token = token.to_uppercase();
        self.allowed_tokens.iter().any(|t| *t == token)
    }

    pub fn is_canary_repo(&self, repo: &str) -> bool {
        let key = repo_key(repo);
        self.canary_repos.iter().any(|r| *r == key)
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a single configuration value
pub fn parse_config_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| CoreError::InvalidConfig {
        key: key.to_string(),
        message: format!("cannot parse {:?}", value),
    })
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(value) => parse_config_value(key, &value).unwrap_or_else(|err| {
            warn!(error = %err, "Ignoring config value");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_lookup(|_| None);
        assert!(!config.production);
        assert_eq!(config.default_execution_mode, ExecutionMode::Execute);
        assert_eq!(config.plan_ttl, Duration::minutes(10));
        assert_eq!(config.replay_capacity, 500);
        assert!(config.is_token_allowed("near"));
        assert!(config.is_token_allowed("USDC"));
        assert!(!config.is_token_allowed("DOGE"));
        assert_eq!(
            config.telemetry_path,
            Some(PathBuf::from("runtime_logs").join(TELEMETRY_FILE_NAME))
        );
    }

    #[test]
    fn test_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AGENT_MODE", "production"),
            ("AGENT_ALLOWED_TOKENS", "near, eth"),
            ("AGENT_MAX_PAYOUT_AMOUNT", "1000"),
            ("AGENT_CANARY_ONLY_PAY", "true"),
            ("TEST_CANARY_REPOS", "https://github.com/Org/Canary/, other/repo"),
            ("AGENT_DEFAULT_EXEC_MODE", "draft"),
            ("WEB_APP_BASE_URL", "https://example.org/"),
        ]));
        assert!(config.production);
        assert!(config.is_token_allowed("ETH"));
        assert!(!config.is_token_allowed("USDC"));
        assert_eq!(config.max_payout_amount, 1000.0);
        assert!(config.canary_only_pay);
        assert!(config.is_canary_repo("org/canary"));
        assert!(config.is_canary_repo("github.com/other/repo"));
        assert_eq!(config.default_execution_mode, ExecutionMode::Draft);
        assert_eq!(config.verify_base_url, "https://example.org/verify");
    }

    #[test]
    fn test_bad_numbers_keep_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[("AGENT_MIN_PARSE_CONFIDENCE", "high")]));
        assert_eq!(config.min_parse_confidence, 0.45);
    }

    #[test]
    fn test_parse_config_value_names_the_key() {
        assert_eq!(parse_config_value::<usize>("AGENT_REPLAY_CAPACITY", "64").unwrap(), 64);
        let err = parse_config_value::<f64>("AGENT_MAX_PAYOUT_AMOUNT", "lots").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid configuration for AGENT_MAX_PAYOUT_AMOUNT: cannot parse \"lots\""
        );
    }
}
