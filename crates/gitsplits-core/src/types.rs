//! Core types for the GitSplits pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Conversation Modes
// ============================================================================

/// Governs whether sensitive intents execute, draft a plan, or are disclosed only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Advisor,
    Draft,
    #[default]
    Execute,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advisor => "advisor",
            Self::Draft => "draft",
            Self::Execute => "execute",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "advisor" => Some(Self::Advisor),
            "draft" => Some(Self::Draft),
            "execute" => Some(Self::Execute),
            _ => None,
        }
    }

    /// Advisor and draft modes stop at a plan
    pub fn requires_plan(&self) -> bool {
        matches!(self, Self::Advisor | Self::Draft)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the assisted classifier may step in on unclear input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceMode {
    #[default]
    Guided,
    HandsOff,
}

impl ExperienceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guided => "guided",
            Self::HandsOff => "hands_off",
        }
    }

    /// Accepts `hands_off`, `hands-off`, `hands off` and `handsoff`
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        match normalized.as_str() {
            "guided" => Some(Self::Guided),
            "handsoff" => Some(Self::HandsOff),
            _ => None,
        }
    }
}

impl fmt::Display for ExperienceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Intents
// ============================================================================

/// The closed set of intents the agent understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentName {
    Analyze,
    Create,
    Pay,
    Verify,
    Pending,
    Reputation,
}

impl IntentName {
    /// Intents the assisted classifier is allowed to produce
    pub const ASSISTABLE: [IntentName; 5] = [
        IntentName::Analyze,
        IntentName::Create,
        IntentName::Pay,
        IntentName::Verify,
        IntentName::Pending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Create => "create",
            Self::Pay => "pay",
            Self::Verify => "verify",
            Self::Pending => "pending",
            Self::Reputation => "reputation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "analyze" => Some(Self::Analyze),
            "create" => Some(Self::Create),
            "pay" => Some(Self::Pay),
            "verify" => Some(Self::Verify),
            "pending" => Some(Self::Pending),
            "reputation" => Some(Self::Reputation),
            _ => None,
        }
    }

    /// Value-moving or state-changing intents
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Create | Self::Pay)
    }

    pub fn is_assistable(&self) -> bool {
        Self::ASSISTABLE.contains(self)
    }
}

impl fmt::Display for IntentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How split percentages are chosen for `create`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Allocation {
    /// Percentages from contribution analysis
    #[default]
    Default,
    /// Explicit shares applied to top contributors in order, e.g. `50/30/20`
    Custom(Vec<u32>),
}

impl Allocation {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("default") {
            return Some(Self::Default);
        }
        let shares = s
            .split('/')
            // Oversized shares saturate so validation reports them
            .map(|p| p.trim().parse::<u64>().ok().map(|n| n.min(u64::from(u32::MAX)) as u32))
            .collect::<Option<Vec<_>>>()?;
        if shares.len() < 2 {
            return None;
        }
        Some(Self::Custom(shares))
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Custom(shares) => {
                let parts: Vec<String> = shares.iter().map(|s| s.to_string()).collect();
                f.write_str(&parts.join("/"))
            }
        }
    }
}

impl Serialize for Allocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Typed parameters extracted for each intent
///
/// Serializes as the bare parameter record (no intent tag), which is the
/// shape shown to users in plans and hashed into plan ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IntentParams {
    Analyze {
        repo: String,
    },
    Create {
        repo: String,
        allocation: Allocation,
    },
    Pay {
        amount: f64,
        token: String,
        repo: String,
    },
    Verify {
        #[serde(skip_serializing_if = "Option::is_none")]
        repo: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        github_username: Option<String>,
    },
    Pending {
        target: String,
    },
    Reputation {
        subject: String,
    },
}

impl IntentParams {
    pub fn intent(&self) -> IntentName {
        match self {
            Self::Analyze { .. } => IntentName::Analyze,
            Self::Create { .. } => IntentName::Create,
            Self::Pay { .. } => IntentName::Pay,
            Self::Verify { .. } => IntentName::Verify,
            Self::Pending { .. } => IntentName::Pending,
            Self::Reputation { .. } => IntentName::Reputation,
        }
    }

    /// Repository reference carried by the parameters, if any
    pub fn repo(&self) -> Option<&str> {
        match self {
            Self::Analyze { repo } | Self::Create { repo, .. } | Self::Pay { repo, .. } => {
                Some(repo.as_str())
            }
            Self::Verify { repo, .. } => repo.as_deref(),
            Self::Pending { .. } | Self::Reputation { .. } => None,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Where an intent resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Pattern,
    Heuristic,
    Llm,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Heuristic => write!(f, "heuristic"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

/// Result of intent resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedIntent {
    pub params: IntentParams,
    pub confidence: f64,
    pub source: ResolutionSource,
}

impl ResolvedIntent {
    pub fn intent(&self) -> IntentName {
        self.params.intent()
    }
}

// ============================================================================
// Messages & Replay
// ============================================================================

/// Transport the message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    Farcaster,
    Twitter,
    #[default]
    Cli,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Farcaster => "farcaster",
            Self::Twitter => "twitter",
            Self::Cli => "cli",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "web" => Some(Self::Web),
            "farcaster" | "cast" => Some(Self::Farcaster),
            "twitter" | "x" => Some(Self::Twitter),
            "cli" => Some(Self::Cli),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message handed to the pipeline by a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub text: String,
    pub author: String,
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
}

impl InboundMessage {
    pub fn new(text: impl Into<String>, author: impl Into<String>, channel: Channel) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
            channel,
            wallet_address: None,
            near_account_id: None,
            evm_address: None,
        }
    }

    pub fn with_near_account(mut self, account: impl Into<String>) -> Self {
        self.near_account_id = Some(account.into());
        self
    }

    pub fn with_wallet_address(mut self, wallet: impl Into<String>) -> Self {
        self.wallet_address = Some(wallet.into());
        self
    }

    pub fn with_evm_address(mut self, address: impl Into<String>) -> Self {
        self.evm_address = Some(address.into());
        self
    }
}

/// Envelope kept in the replay store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayableCommand {
    pub event_id: String,
    pub text: String,
    pub author: String,
    #[serde(rename = "type")]
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReplayableCommand {
    pub fn from_message(
        event_id: impl Into<String>,
        message: &InboundMessage,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            text: message.text.clone(),
            author: message.author.clone(),
            channel: message.channel,
            wallet_address: message.wallet_address.clone(),
            near_account_id: message.near_account_id.clone(),
            evm_address: message.evm_address.clone(),
            created_at,
        }
    }

    pub fn to_message(&self) -> InboundMessage {
        InboundMessage {
            text: self.text.clone(),
            author: self.author.clone(),
            channel: self.channel,
            wallet_address: self.wallet_address.clone(),
            near_account_id: self.near_account_id.clone(),
            evm_address: self.evm_address.clone(),
        }
    }
}

// ============================================================================
// Plans & Gates
// ============================================================================

/// A time-boxed proposal for a sensitive action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub id: String,
    pub intent: IntentName,
    pub params: IntentParams,
    pub dependencies: Vec<String>,
    pub risks: Vec<String>,
    pub outputs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confidence: f64,
}

impl Plan {
    /// A plan stays usable up to and including its expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Outcome of the policy gate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reasons: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyCode {
    NoRecipients,
    BotHeavy,
    OutlierShare,
    MissingWallets,
}

impl SafetyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRecipients => "NO_RECIPIENTS",
            Self::BotHeavy => "BOT_HEAVY",
            Self::OutlierShare => "OUTLIER_SHARE",
            Self::MissingWallets => "MISSING_WALLETS",
        }
    }
}

impl fmt::Display for SafetyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub level: AlertLevel,
    pub code: SafetyCode,
    pub message: String,
}

/// A recipient as seen by the safety inspector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientSnapshot {
    pub username: String,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

impl RecipientSnapshot {
    pub fn new(username: impl Into<String>, percentage: f64, wallet: Option<String>) -> Self {
        Self {
            username: username.into(),
            percentage,
            wallet,
        }
    }
}

// ============================================================================
// Collaborator Records
// ============================================================================

/// A contributor as reported by repository analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub username: String,
    pub commits: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitContributor {
    pub github_username: String,
    pub percentage: u32,
}

/// A payout split stored by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub id: String,
    pub repo_url: String,
    pub owner: String,
    pub contributors: Vec<SplitContributor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Funds reserved for a contributor who has not verified a wallet yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingClaim {
    pub id: String,
    pub github_username: String,
    pub amount: f64,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub github_username: String,
    pub requested_by: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Human,
    Agent,
    Unknown,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Agent => write!(f, "agent"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReputationTier {
    Gold,
    Silver,
    Bronze,
}

impl ReputationTier {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            Self::Gold
        } else if score >= 55 {
            Self::Silver
        } else {
            Self::Bronze
        }
    }
}

impl fmt::Display for ReputationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gold => write!(f, "gold"),
            Self::Silver => write!(f, "silver"),
            Self::Bronze => write!(f, "bronze"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationProfile {
    pub subject: String,
    pub kind: SubjectKind,
    pub score: u8,
    pub tier: ReputationTier,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutEligibility {
    pub eligible: bool,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experience_mode_spellings() {
        assert_eq!(ExperienceMode::parse("hands_off"), Some(ExperienceMode::HandsOff));
        assert_eq!(ExperienceMode::parse("Hands-Off"), Some(ExperienceMode::HandsOff));
        assert_eq!(ExperienceMode::parse("hands off"), Some(ExperienceMode::HandsOff));
        assert_eq!(ExperienceMode::parse("guided"), Some(ExperienceMode::Guided));
        assert_eq!(ExperienceMode::parse("autopilot"), None);
    }

    #[test]
    fn test_action_intents() {
        assert!(IntentName::Pay.is_action());
        assert!(IntentName::Create.is_action());
        assert!(!IntentName::Analyze.is_action());
        assert!(!IntentName::Reputation.is_assistable());
    }

    #[test]
    fn test_allocation_parse() {
        assert_eq!(Allocation::parse("default"), Some(Allocation::Default));
        assert_eq!(Allocation::parse("50/30/20"), Some(Allocation::Custom(vec![50, 30, 20])));
        assert_eq!(Allocation::parse("50"), None);
        assert_eq!(Allocation::parse("50/x"), None);
        assert_eq!(
            Allocation::parse("99999999999/1"),
            Some(Allocation::Custom(vec![u32::MAX, 1]))
        );
        assert_eq!(Allocation::Custom(vec![60, 40]).to_string(), "60/40");
    }

    #[test]
    fn test_params_serialize_without_tag() {
        let params = IntentParams::Pay {
            amount: 100.0,
            token: "USDC".to_string(),
            repo: "org/repo".to_string(),
        };
        let value = params.to_value();
        assert_eq!(value["token"], "USDC");
        assert_eq!(value["repo"], "org/repo");
        assert!(value.get("Pay").is_none());
        assert_eq!(params.intent(), IntentName::Pay);
    }

    #[test]
    fn test_reputation_tier_bounds() {
        assert_eq!(ReputationTier::from_score(80), ReputationTier::Gold);
        assert_eq!(ReputationTier::from_score(79), ReputationTier::Silver);
        assert_eq!(ReputationTier::from_score(55), ReputationTier::Silver);
        assert_eq!(ReputationTier::from_score(54), ReputationTier::Bronze);
    }

    #[test]
    fn test_replay_envelope_round_trips_message() {
        let msg = InboundMessage::new("analyze org/repo", "alice", Channel::Web)
            .with_near_account("alice.near");
        let cmd = ReplayableCommand::from_message("abc", &msg, Utc::now());
        assert_eq!(cmd.to_message(), msg);
    }
}
