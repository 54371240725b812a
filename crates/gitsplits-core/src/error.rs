//! Error types for GitSplits
//!
//! `CoreError` covers local failures inside this crate. `PipelineError` is the
//! user-facing taxonomy: every variant renders the exact text returned to the
//! user, and the controller turns each one into a response instead of failing.

use thiserror::Error;

use crate::types::SafetyAlert;

/// Errors raised by core helpers
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Invalid allocation: {message}")]
    InvalidAllocation { message: String },
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// User-facing pipeline failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed or missing parameters
    #[error("❌ {message}")]
    Validation { message: String },

    #[error("🛑 Policy blocked {intent}: {}", .reasons.join(" | "))]
    PolicyDenied { intent: String, reasons: Vec<String> },

    #[error("{}", render_safety_block(.alerts))]
    SafetyBlocked { alerts: Vec<SafetyAlert> },

    /// Repository, ledger, inference or reputation lookups failed
    #[error("❌ {context}: {message}")]
    CollaboratorUnavailable { context: String, message: String },

    /// Both payment engines failed, or the only eligible one did
    #[error("❌ Payment failed: {message}")]
    PaymentEngineFailure { message: String },

    #[error("Plan {plan_id} expired. Request a fresh plan.")]
    PlanExpired { plan_id: String },

    #[error("Pending plan mismatch. Expected {expected}.")]
    PlanMismatch { expected: String },

    #[error("No pending plan to approve.")]
    NoPendingPlan,
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn collaborator(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::CollaboratorUnavailable {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

fn render_safety_block(alerts: &[SafetyAlert]) -> String {
    let lines: Vec<String> = alerts
        .iter()
        .map(|alert| format!("- [{}] {}", alert.level.as_str().to_uppercase(), alert.message))
        .collect();
    format!(
        "🛑 Safety review required before payout:\n{}\n\nReply with \"override safety\" to proceed anyway.",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertLevel, SafetyCode};

    #[test]
    fn test_policy_denied_joins_reasons() {
        let err = PipelineError::PolicyDenied {
            intent: "pay".to_string(),
            reasons: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(err.to_string(), "🛑 Policy blocked pay: first | second");
    }

    #[test]
    fn test_safety_block_lists_alerts() {
        let err = PipelineError::SafetyBlocked {
            alerts: vec![SafetyAlert {
                level: AlertLevel::High,
                code: SafetyCode::NoRecipients,
                message: "No recipients were resolved for this distribution.".to_string(),
            }],
        };
        let text = err.to_string();
        assert!(text.contains("- [HIGH] No recipients were resolved"));
        assert!(text.contains("override safety"));
    }

    #[test]
    fn test_plan_messages() {
        assert_eq!(
            PipelineError::PlanMismatch {
                expected: "plan-0123456789".to_string()
            }
            .to_string(),
            "Pending plan mismatch. Expected plan-0123456789."
        );
        assert_eq!(
            PipelineError::PlanExpired {
                plan_id: "plan-0123456789".to_string()
            }
            .to_string(),
            "Plan plan-0123456789 expired. Request a fresh plan."
        );
    }
}
