use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gitsplits_agent_kernel::{
    AgentKernel, HeuristicReputation, InMemoryLedger, KernelConfig, SplitLedger, StaticAnalyzer,
    Tools,
};
use gitsplits_audit::{MemorySink, Telemetry};
use gitsplits_core::{AgentConfig, Channel, ExecutionMode, InboundMessage, ManualClock};
use gitsplits_llm::MockInferenceProvider;
use gitsplits_payments::{
    DistributionRequest, EngineReceipt, PaymentEngine, PaymentError, PaymentOrchestrator,
};

struct CountingEngine {
    name: &'static str,
    fail: bool,
    calls: AtomicUsize,
}

impl CountingEngine {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentEngine for CountingEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn protocol(&self) -> &'static str {
        "test-rail"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn distribute(
        &self,
        _request: &DistributionRequest,
    ) -> Result<EngineReceipt, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PaymentError::Network {
                engine: self.name.to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(EngineReceipt {
            tx_hash: format!("0x{}", self.name),
            intent_id: None,
            status: "completed".to_string(),
            payment_url: None,
            mock: false,
        })
    }
}

struct Harness {
    kernel: AgentKernel,
    ledger: Arc<InMemoryLedger>,
    engine_a: Arc<CountingEngine>,
    engine_b: Arc<CountingEngine>,
    events: Arc<MemorySink>,
    clock: Arc<ManualClock>,
}

impl Harness {
    async fn send(&self, text: &str) -> String {
        self.kernel
            .process_message(InboundMessage::new(text, "alice-owner", Channel::Cli))
            .await
    }

    async fn pending_plan_id(&self) -> Option<String> {
        self.kernel
            .conversation("alice-owner")
            .await
            .and_then(|state| state.pending_plan)
            .map(|plan| plan.id)
    }

    fn event_count(&self, event_type: &str) -> usize {
        self.events.records_of(event_type).len()
    }
}

fn build_kernel(agent: AgentConfig, engine_a: CountingEngine) -> Harness {
    build_kernel_with_rails(agent, engine_a, CountingEngine::new("native"))
}

fn build_kernel_with_rails(
    agent: AgentConfig,
    engine_a: CountingEngine,
    engine_b: CountingEngine,
) -> Harness {
    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_split(
                "gitsplits/demo",
                "owner.near",
                &[("alice", 60), ("bob", 30), ("carol", 10)],
            )
            .with_split("org/bots", "owner.near", &[("dependabot[bot]", 60), ("alice", 40)])
            .with_wallet("alice", "alice.near")
            .with_wallet("bob", "bob.near"),
    );
    let engine_a = Arc::new(engine_a);
    let engine_b = Arc::new(engine_b);
    let tools = Tools {
        analyzer: Arc::new(StaticAnalyzer::demo()),
        ledger: ledger.clone(),
        reputation: Arc::new(HeuristicReputation::default()),
        inference: Arc::new(MockInferenceProvider::new("Shares track commit history.")),
        payments: PaymentOrchestrator::new(engine_a.clone(), engine_b.clone(), "NEAR"),
    };
    let (telemetry, events) = Telemetry::memory();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));

    let kernel = AgentKernel::new(
        KernelConfig::new(agent, tools)
            .with_telemetry(telemetry)
            .with_clock(clock.clone()),
    );
    Harness {
        kernel,
        ledger,
        engine_a,
        engine_b,
        events,
        clock,
    }
}

fn default_kernel() -> Harness {
    build_kernel(AgentConfig::default(), CountingEngine::new("intents"))
}

#[tokio::test]
async fn test_advisor_pay_returns_plan_without_payment() {
    let h = default_kernel();
    assert_eq!(h.send("mode advisor").await, "✅ Execution mode set to advisor.");

    let response = h.send("pay 100 USDC to org/repo").await;
    assert!(response.starts_with("Advisor mode is active.\n\n🧭 Execution plan prepared (pay)."));
    assert!(response.contains("split_exists"));
    assert!(response.contains("verified_recipients"));
    assert!(response.contains("onchain_value_transfer"));
    assert_eq!(h.engine_a.calls() + h.engine_b.calls(), 0);
    assert!(h.pending_plan_id().await.is_some());
    assert_eq!(h.event_count("plan_created"), 1);
    assert_eq!(h.event_count("intent_executed"), 0);
}

#[tokio::test]
async fn test_advisor_plan_cannot_be_approved() {
    let h = default_kernel();
    h.send("mode advisor").await;
    h.send("pay 100 USDC to gitsplits/demo").await;

    let response = h.send("approve").await;
    assert_eq!(
        response,
        "🛑 Policy blocked pay: Advisor mode does not execute on-chain/payment actions."
    );
    assert_eq!(h.engine_a.calls(), 0);
    assert!(h.pending_plan_id().await.is_none());
}

#[tokio::test]
async fn test_draft_plan_approval_executes_payment() {
    let h = default_kernel();
    h.send("mode draft").await;

    let response = h.send("pay 100 USDC to gitsplits/demo").await;
    assert!(response.starts_with("Draft mode is active."));
    assert_eq!(h.engine_a.calls(), 0);
    let plan_id = h.pending_plan_id().await.unwrap();

    let response = h.send(&format!("approve {}", plan_id)).await;
    assert!(
        response.starts_with(
            "✅ Distributed 90.0000 USDC to 2 payout-eligible verified contributors via Intents Rail!"
        ),
        "unexpected response: {}",
        response
    );
    assert!(response.contains("Coverage: 2/3 contributors eligible+verified"));
    assert!(response.contains("🔗 Transaction: 0xintents"));
    assert!(response.contains("- carol: 10.0000 USDC (claim id: claim-1)"));
    assert!(response.contains("⚠️ Safety flags: MISSING_WALLETS"));
    assert_eq!(h.engine_a.calls(), 1);
    assert_eq!(h.engine_b.calls(), 0);

    let state = h.kernel.conversation("alice-owner").await.unwrap();
    assert!(state.pending_plan.is_none());
    assert_eq!(state.last_payment.unwrap().tx_hash, "0xintents");
    assert!(state.repo_memory.contains_key("gitsplits/demo"));
    assert_eq!(h.event_count("plan_executed"), 1);

    let claims = h.ledger.pending_claims("carol").await.unwrap();
    assert_eq!(claims.len(), 1);
}

#[tokio::test]
async fn test_approve_mismatch_keeps_plan() {
    let h = default_kernel();
    h.send("mode draft").await;
    h.send("pay 10 USDC to gitsplits/demo").await;
    let plan_id = h.pending_plan_id().await.unwrap();

    let response = h.send("approve plan-0000000000").await;
    assert_eq!(response, format!("Pending plan mismatch. Expected {}.", plan_id));
    assert_eq!(h.pending_plan_id().await, Some(plan_id));
    assert_eq!(h.event_count("plan_rejected"), 1);
}

#[tokio::test]
async fn test_approve_with_foreign_id_is_a_mismatch() {
    let h = default_kernel();
    h.send("mode draft").await;
    h.send("pay 10 USDC to gitsplits/demo").await;
    let plan_id = h.pending_plan_id().await.unwrap();

    let response = h.send("approve 12345").await;
    assert_eq!(response, format!("Pending plan mismatch. Expected {}.", plan_id));
    assert_eq!(h.pending_plan_id().await, Some(plan_id));
    assert_eq!(h.event_count("intent_unresolved"), 0);
    assert_eq!(h.engine_a.calls(), 0);
}

#[tokio::test]
async fn test_approve_after_expiry_clears_plan() {
    let h = default_kernel();
    h.send("mode draft").await;
    h.send("pay 10 USDC to gitsplits/demo").await;
    let plan_id = h.pending_plan_id().await.unwrap();

    h.clock.advance(Duration::minutes(11));
    let response = h.send("approve").await;
    assert_eq!(response, format!("Plan {} expired. Request a fresh plan.", plan_id));
    assert!(h.pending_plan_id().await.is_none());
    assert_eq!(h.engine_a.calls(), 0);
}

#[tokio::test]
async fn test_approve_without_plan() {
    let h = default_kernel();
    assert_eq!(h.send("approve").await, "No pending plan to approve.");
}

#[tokio::test]
async fn test_cancel_and_mode_change_clear_plan() {
    let h = default_kernel();
    h.send("mode draft").await;
    h.send("pay 10 USDC to gitsplits/demo").await;
    assert!(h.pending_plan_id().await.is_some());
    assert_eq!(h.send("cancel").await, "Cancelled pending plan.");
    assert!(h.pending_plan_id().await.is_none());

    h.send("pay 10 USDC to gitsplits/demo").await;
    assert!(h.pending_plan_id().await.is_some());
    h.send("mode execute").await;
    assert!(h.pending_plan_id().await.is_none());
}

#[tokio::test]
async fn test_require_approval_plans_in_execute_mode() {
    let h = build_kernel(
        AgentConfig {
            require_approval: true,
            ..AgentConfig::default()
        },
        CountingEngine::new("intents"),
    );

    let response = h.send("pay 10 USDC to gitsplits/demo").await;
    assert!(response.starts_with("🧭 Execution plan prepared (pay)."));
    assert_eq!(h.engine_a.calls(), 0);

    let response = h.send("approve").await;
    assert!(response.starts_with("✅ Distributed"));
    assert_eq!(h.engine_a.calls(), 1);
}

#[tokio::test]
async fn test_native_token_uses_native_rail() {
    let h = default_kernel();
    let response = h.send("pay 10 NEAR to gitsplits/demo").await;
    assert!(response.contains("via Native Rail!"), "unexpected response: {}", response);
    assert!(response.contains("Payment mode: agent_rails_engineB"));
    assert_eq!(h.engine_a.calls(), 0);
    assert_eq!(h.engine_b.calls(), 1);
}

#[tokio::test]
async fn test_intents_rail_failure_falls_back_once() {
    let h = build_kernel(AgentConfig::default(), CountingEngine::failing("intents"));
    let response = h.send("pay 10 USDC to gitsplits/demo").await;
    assert!(
        response.contains("via Native Rail (Intents Rail fallback)!"),
        "unexpected response: {}",
        response
    );
    assert!(response.contains("Payment mode: agent_rails_engineB_fallback"));
    assert_eq!(h.engine_a.calls(), 1);
    assert_eq!(h.engine_b.calls(), 1);
}

#[tokio::test]
async fn test_failed_payout_stores_no_claims() {
    let h = build_kernel_with_rails(
        AgentConfig::default(),
        CountingEngine::failing("intents"),
        CountingEngine::failing("native"),
    );

    for _ in 0..2 {
        let response = h.send("pay 10 USDC to gitsplits/demo").await;
        assert!(response.starts_with("❌ Payment failed:"), "unexpected response: {}", response);
    }
    assert_eq!(h.engine_a.calls(), 2);
    assert_eq!(h.engine_b.calls(), 2);
    assert!(h.ledger.pending_claims("carol").await.unwrap().is_empty());

    let state = h.kernel.conversation("alice-owner").await.unwrap();
    assert!(state.last_payment.is_none());
}

#[tokio::test]
async fn test_policy_block_reports_every_reason() {
    let h = default_kernel();
    let response = h.send("pay 1000 DOGE to gitsplits/demo").await;
    assert_eq!(
        response,
        "🛑 Policy blocked pay: Token DOGE is not allowed by policy. | Pay amount 1000 exceeds policy max 250."
    );
    assert_eq!(h.event_count("policy_block"), 1);
    assert_eq!(h.engine_a.calls() + h.engine_b.calls(), 0);
}

#[tokio::test]
async fn test_safety_block_has_no_side_effects() {
    let h = default_kernel();
    let response = h.send("pay 10 USDC to org/bots").await;
    assert!(response.starts_with("🛑 Safety review required before payout:"));
    assert!(response.contains("override safety"));
    assert_eq!(h.engine_a.calls(), 0);
    assert!(h.ledger.pending_claims("dependabot[bot]").await.unwrap().is_empty());

    let response = h.send("pay 10 USDC to org/bots override safety").await;
    assert!(
        response.starts_with("✅ Distributed 4.0000 USDC"),
        "unexpected response: {}",
        response
    );
    assert!(response.contains("BOT_HEAVY"));
    assert_eq!(h.engine_a.calls(), 1);
}

#[tokio::test]
async fn test_replay_lifecycle() {
    let h = default_kernel();
    assert_eq!(h.send("replay nope").await, "Replay id not found: nope");

    let original = h.send("analyze gitsplits/demo").await;
    assert!(original.starts_with("📊 Analysis for github.com/gitsplits/demo"));
    let executed = h.events.records_of("intent_executed");
    let event_id = executed[0]["eventId"].as_str().unwrap().to_string();

    let replayed = h.send(&format!("replay {}", event_id)).await;
    assert!(replayed.starts_with(&format!(
        "🔁 Replay {}\n\n📊 Analysis for github.com/gitsplits/demo",
        event_id
    )));
    assert_eq!(h.event_count("replay_started"), 1);
    assert_eq!(h.event_count("intent_executed"), 2);
    // The replayed turn is registered under its own event id
    assert_eq!(h.kernel.replay_store().len(), 2);

    h.clock.advance(Duration::hours(25));
    assert_eq!(
        h.send(&format!("replay {}", event_id)).await,
        format!("Replay id expired: {}", event_id)
    );
    assert_eq!(h.event_count("intent_executed"), 2);
}

#[tokio::test]
async fn test_hands_off_uses_assistant() {
    let h = default_kernel();
    let text = "could you look at contributors of gitsplits/demo";
    assert_eq!(
        h.send(text).await,
        "I didn't understand that. Try: 'analyze near/near-sdk-rs'"
    );
    assert_eq!(h.event_count("intent_unresolved"), 1);

    assert_eq!(
        h.send("experience hands-off").await,
        "✅ Experience mode set to hands_off."
    );
    let response = h.send(text).await;
    assert!(response.starts_with("📊 Analysis for github.com/gitsplits/demo"));

    let assisted = h.events.records_of("hands_off_assisted_parse");
    assert_eq!(assisted.len(), 1);
    assert_eq!(assisted[0]["suggestedIntent"], "analyze");
    assert_eq!(assisted[0]["source"], "heuristic");
}

#[tokio::test]
async fn test_validation_error_is_reported_inline() {
    let h = default_kernel();
    let response = h.send("create gitsplits/demo 50/30").await;
    assert!(response.starts_with("❌ "), "unexpected response: {}", response);
    assert_eq!(h.ledger.split_count(), 2);
}

#[tokio::test]
async fn test_oversized_allocation_share_is_rejected() {
    let h = default_kernel();
    for text in [
        "create gitsplits/new with 4294967295/1",
        "create gitsplits/new with 4294967295/101",
        "create gitsplits/new with 99999999999/1",
    ] {
        let response = h.send(text).await;
        assert!(
            response.starts_with("❌ ") && response.contains("exceeds 100"),
            "unexpected response for {:?}: {}",
            text,
            response
        );
    }
    assert_eq!(h.ledger.split_count(), 2);
}

#[tokio::test]
async fn test_verification_links_are_encoded() {
    let h = default_kernel();
    let response = h.send("verify contributors for gitsplits/demo").await;
    assert!(response.starts_with("🔎 Verification status for github.com/gitsplits/demo"));
    assert!(
        response.contains("• @carol: https://gitsplits.xyz/verify?repo=gitsplits%2Fdemo&user=carol"),
        "unexpected response: {}",
        response
    );
}

#[tokio::test]
async fn test_users_keep_separate_state() {
    let h = default_kernel();
    h.send("mode draft").await;

    let other = h
        .kernel
        .process_message(InboundMessage::new("pay 10 NEAR to gitsplits/demo", "bob", Channel::Web))
        .await;
    assert!(other.starts_with("✅ Distributed"));

    let first = h.kernel.conversation("alice-owner").await.unwrap();
    let second = h.kernel.conversation("bob").await.unwrap();
    assert_eq!(first.execution_mode, Some(ExecutionMode::Draft));
    assert_eq!(second.execution_mode, None);
    assert!(second.last_payment.is_some());
}
