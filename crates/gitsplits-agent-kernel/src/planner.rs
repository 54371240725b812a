//! Action plans for value-moving intents

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;

use gitsplits_core::{short_hash, IntentName, IntentParams, Plan};

/// Build a plan for `params`, valid for `ttl` from `now`
///
/// The id is `plan-` plus the first 10 hex chars of a SHA-256 over the
/// intent, its parameters and the creation instant.
pub fn create_action_plan(
    params: IntentParams,
    warnings: &[String],
    confidence: f64,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Plan {
    let intent = params.intent();
    let seed = json!({
        "intent": intent,
        "params": params,
        "now": now.timestamp_millis(),
    })
    .to_string();

    let mut risks: Vec<String> = warnings.to_vec();
    let (dependencies, outputs) = match intent {
        IntentName::Pay => {
            risks.push("onchain_value_transfer".to_string());
            (
                strings(&[
                    "split_exists",
                    "verified_recipients",
                    "payment_policy",
                    "wallet_or_rails_auth",
                ]),
                strings(&["tx_hash_or_intent_ref", "coverage_summary", "pending_claims"]),
            )
        }
        _ => {
            risks.push("onchain_state_change".to_string());
            (
                strings(&["repo_analysis", "ledger_connectivity", "worker_registration"]),
                strings(&["split_id", "allocation_preview", "verification_coverage"]),
            )
        }
    };

    Plan {
        id: format!("plan-{}", short_hash(seed.as_bytes(), 10)),
        intent,
        params,
        dependencies,
        risks,
        outputs,
        created_at: now,
        expires_at: now + ttl,
        confidence,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Render a plan with approval instructions
pub fn format_plan(plan: &Plan) -> String {
    let payload = json!({
        "id": plan.id,
        "intent": plan.intent,
        "params": plan.params,
        "dependencies": plan.dependencies,
        "risks": plan.risks,
        "outputs": plan.outputs,
        "confidence": (plan.confidence * 100.0).round() / 100.0,
        "expiresAt": plan.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    let body = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    format!(
        "🧭 Execution plan prepared ({}).\n\n```json\n{}\n```\n\nReply with \"approve {}\" to execute, or \"cancel\" to discard.",
        plan.intent, body, plan.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pay() -> IntentParams {
        IntentParams::Pay {
            amount: 100.0,
            token: "USDC".to_string(),
            repo: "org/repo".to_string(),
        }
    }

    #[test]
    fn test_plan_id_shape() {
        let now = Utc::now();
        let plan = create_action_plan(pay(), &[], 0.95, now, Duration::minutes(10));
        assert!(plan.id.starts_with("plan-"));
        assert_eq!(plan.id.len(), 15);
        assert!(plan.id[5..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(plan.expires_at - plan.created_at, Duration::minutes(10));
    }

    #[test]
    fn test_plan_id_depends_on_time() {
        let now = Utc::now();
        let a = create_action_plan(pay(), &[], 0.95, now, Duration::minutes(10));
        let b = create_action_plan(pay(), &[], 0.95, now, Duration::minutes(10));
        let later = now + Duration::milliseconds(1);
        let c = create_action_plan(pay(), &[], 0.95, later, Duration::minutes(10));
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_pay_plan_contents() {
        let plan = create_action_plan(pay(), &[], 0.95, Utc::now(), Duration::minutes(10));
        assert!(plan.dependencies.contains(&"split_exists".to_string()));
        assert!(plan.dependencies.contains(&"verified_recipients".to_string()));
        assert_eq!(plan.risks, vec!["onchain_value_transfer".to_string()]);
    }

    #[test]
    fn test_create_plan_carries_warnings() {
        let params = IntentParams::Create {
            repo: "org/repo".to_string(),
            allocation: gitsplits_core::Allocation::Default,
        };
        let warnings = vec!["Create intent will write split state on mainnet.".to_string()];
        let plan = create_action_plan(params, &warnings, 0.9, Utc::now(), Duration::minutes(10));
        assert_eq!(plan.risks[0], warnings[0]);
        assert_eq!(plan.risks[1], "onchain_state_change");
        assert!(plan.outputs.contains(&"split_id".to_string()));
    }

    #[test]
    fn test_format_plan() {
        let plan = create_action_plan(pay(), &[], 0.951, Utc::now(), Duration::minutes(10));
        let text = format_plan(&plan);
        assert!(text.starts_with("🧭 Execution plan prepared (pay)."));
        assert!(text.contains("\"split_exists\""));
        assert!(text.contains("\"confidence\": 0.95"));
        assert!(text.ends_with(&format!(
            "Reply with \"approve {}\" to execute, or \"cancel\" to discard.",
            plan.id
        )));
    }
}
