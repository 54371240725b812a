//! Payout safety inspector
//!
//! Pure checks over a recipient snapshot. High alerts block a payout unless
//! the requester explicitly overrides; lower levels are advisory.

use gitsplits_core::{is_system_contributor, AlertLevel, RecipientSnapshot, SafetyAlert, SafetyCode};

/// Phrases that let a requester proceed past high alerts
pub const OVERRIDE_PHRASES: [&str; 2] = ["override safety", "force pay"];

const BOT_HEAVY_SHARE: f64 = 50.0;
const OUTLIER_SHARE: f64 = 95.0;
const OUTLIER_MIN_RECIPIENTS: usize = 3;

/// Inspect a distribution for concentration and coverage risks
pub fn inspect_distribution_risk(recipients: &[RecipientSnapshot]) -> Vec<SafetyAlert> {
    if recipients.is_empty() {
        return vec![SafetyAlert {
            level: AlertLevel::High,
            code: SafetyCode::NoRecipients,
            message: "No recipients were resolved for this distribution.".to_string(),
        }];
    }

    let mut alerts = Vec::new();

    let bot_share: f64 = recipients
        .iter()
        .filter(|r| is_system_contributor(&r.username))
        .map(|r| r.percentage)
        .sum();
    if bot_share >= BOT_HEAVY_SHARE {
        alerts.push(SafetyAlert {
            level: AlertLevel::High,
            code: SafetyCode::BotHeavy,
            message: format!(
                "Bot/system contributors account for {:.1}% of allocation.",
                bot_share
            ),
        });
    }

    let max_share = recipients
        .iter()
        .map(|r| r.percentage)
        .fold(0.0_f64, f64::max);
    if recipients.len() >= OUTLIER_MIN_RECIPIENTS && max_share >= OUTLIER_SHARE {
        alerts.push(SafetyAlert {
            level: AlertLevel::Medium,
            code: SafetyCode::OutlierShare,
            message: format!("One recipient has {:.1}% share; review before paying.", max_share),
        });
    }

    let missing = recipients
        .iter()
        .filter(|r| r.wallet.as_deref().map_or(true, str::is_empty))
        .count();
    if missing > 0 {
        alerts.push(SafetyAlert {
            level: AlertLevel::Low,
            code: SafetyCode::MissingWallets,
            message: format!(
                "{} recipients are missing verified wallets and will not be paid now.",
                missing
            ),
        });
    }

    alerts
}

/// Block iff a high alert exists and the text carries no override phrase
pub fn should_block_for_safety(alerts: &[SafetyAlert], override_text: &str) -> bool {
    let has_high = alerts.iter().any(|a| a.level == AlertLevel::High);
    if !has_high {
        return false;
    }
    let lower = override_text.to_lowercase();
    !OVERRIDE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(name: &str, pct: f64, wallet: Option<&str>) -> RecipientSnapshot {
        RecipientSnapshot::new(name, pct, wallet.map(str::to_string))
    }

    #[test]
    fn test_empty_recipients_single_high_alert() {
        let alerts = inspect_distribution_risk(&[]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::High);
        assert_eq!(alerts[0].code, SafetyCode::NoRecipients);
    }

    #[test]
    fn test_override_phrases() {
        let alerts = inspect_distribution_risk(&[]);
        assert!(should_block_for_safety(&alerts, ""));
        assert!(!should_block_for_safety(&alerts, "pay 10 NEAR to org/repo, Override Safety"));
        assert!(!should_block_for_safety(&alerts, "FORCE PAY please"));
    }

    #[test]
    fn test_bot_heavy() {
        let alerts = inspect_distribution_risk(&[
            recipient("dependabot[bot]", 60.0, Some("bot.near")),
            recipient("alice", 20.0, Some("alice.near")),
            recipient("bob", 20.0, Some("bob.near")),
        ]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].code, SafetyCode::BotHeavy);
        assert_eq!(
            alerts[0].message,
            "Bot/system contributors account for 60.0% of allocation."
        );
        assert!(should_block_for_safety(&alerts, "pay 10 NEAR"));
    }

    #[test]
    fn test_outlier_share() {
        let alerts = inspect_distribution_risk(&[
            recipient("a", 96.0, Some("a.near")),
            recipient("b", 2.0, Some("b.near")),
            recipient("c", 2.0, Some("c.near")),
        ]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].code, SafetyCode::OutlierShare);
        assert_eq!(alerts[0].level, AlertLevel::Medium);
        assert!(!should_block_for_safety(&alerts, ""));
    }

    #[test]
    fn test_outlier_needs_three_recipients() {
        let alerts = inspect_distribution_risk(&[
            recipient("a", 96.0, Some("a.near")),
            recipient("b", 4.0, Some("b.near")),
        ]);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_missing_wallets_is_advisory() {
        let alerts = inspect_distribution_risk(&[
            recipient("a", 50.0, Some("a.near")),
            recipient("b", 30.0, None),
            recipient("c", 20.0, Some("")),
        ]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].code, SafetyCode::MissingWallets);
        assert_eq!(
            alerts[0].message,
            "2 recipients are missing verified wallets and will not be paid now."
        );
        assert!(!should_block_for_safety(&alerts, ""));
    }
}
