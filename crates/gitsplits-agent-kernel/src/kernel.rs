//! AgentKernel: the per-turn command pipeline
//!
//! One turn is: control commands, then resolution (with the assistant in
//! hands-off mode), the confidence gate, the policy gate, planning for
//! action intents that need approval, and finally execution. Every
//! transition is recorded to telemetry.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use gitsplits_audit::{create_event_id, ReplayLookup, ReplayStore, Telemetry, TelemetryEvent};
use gitsplits_core::{
    AgentConfig, Clock, ExecutionMode, ExperienceMode, InboundMessage, IntentName, PipelineError,
    ReplayableCommand, ResolvedIntent, SystemClock,
};
use gitsplits_policy::{PayoutPolicy, PolicyConfig, PolicyGate, PolicyRequest};

use crate::assistant::{format_assisted_suggestion, IntentAssistant};
use crate::control::ControlCommand;
use crate::intents::{self, IntentContext, Tools};
use crate::planner::{create_action_plan, format_plan};
use crate::state::{ConversationState, ConversationStore};

const UNRESOLVED: &str = "I didn't understand that. Try: 'analyze near/near-sdk-rs'";

pub struct KernelConfig {
    pub agent: AgentConfig,
    pub tools: Tools,
    pub policy: Box<dyn PolicyGate>,
    pub telemetry: Telemetry,
    pub clock: Arc<dyn Clock>,
}

impl KernelConfig {
    /// Payout policy from `agent`, telemetry at its configured path, system clock
    pub fn new(agent: AgentConfig, tools: Tools) -> Self {
        let policy = Box::new(PayoutPolicy::new(PolicyConfig::from(&agent)));
        let telemetry = Telemetry::from_path(agent.telemetry_path.as_deref());
        Self {
            agent,
            tools,
            policy,
            telemetry,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn PolicyGate>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// What a turn produced while the user's state was locked
enum Turn {
    Reply(String),
    /// Re-run a stored envelope once the lock is released
    Replay {
        id: String,
        command: ReplayableCommand,
    },
}

pub struct AgentKernel {
    config: AgentConfig,
    tools: Tools,
    policy: Box<dyn PolicyGate>,
    telemetry: Telemetry,
    clock: Arc<dyn Clock>,
    assistant: IntentAssistant,
    replay: ReplayStore,
    conversations: ConversationStore,
}

impl AgentKernel {
    pub fn new(config: KernelConfig) -> Self {
        let inference = config
            .agent
            .assist_with_inference
            .then(|| config.tools.inference.clone());
        let replay = ReplayStore::new(config.agent.replay_capacity, config.agent.replay_ttl);
        Self {
            config: config.agent,
            tools: config.tools,
            policy: config.policy,
            telemetry: config.telemetry,
            clock: config.clock,
            assistant: IntentAssistant::new(inference),
            replay,
            conversations: ConversationStore::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn replay_store(&self) -> &ReplayStore {
        &self.replay
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Copy of a user's conversation state, if they have sent anything
    pub async fn conversation(&self, author: &str) -> Option<ConversationState> {
        self.conversations.snapshot(author).await
    }

    /// Run one turn and return the response text
    ///
    /// Never fails: every error is rendered into the response. Turns for
    /// the same author are serialized on that author's state lock.
    pub fn process_message(&self, message: InboundMessage) -> BoxFuture<'_, String> {
        async move {
            let event_id = create_event_id();
            self.telemetry.record(
                TelemetryEvent::new("message_received", &event_id)
                    .with("author", &message.author)
                    .with("channel", message.channel.as_str())
                    .with("text", &message.text),
            );

            let handle = self.conversations.handle(&message.author);
            let turn = {
                let mut state = handle.lock().await;
                self.run_turn(&event_id, &message, &mut state).await
            };

            match turn {
                Turn::Reply(response) => response,
                Turn::Replay { id, command } => {
                    let response = self.process_message(command.to_message()).await;
                    format!("🔁 Replay {}\n\n{}", id, response)
                }
            }
        }
        .boxed()
    }

    async fn run_turn(
        &self,
        event_id: &str,
        message: &InboundMessage,
        state: &mut ConversationState,
    ) -> Turn {
        match ControlCommand::parse(&message.text) {
            Some(command) => self.control(command, event_id, message, state).await,
            None => Turn::Reply(self.handle_intent(event_id, message, state).await),
        }
    }

    // ========================================================================
    // Control Commands
    // ========================================================================

    async fn control(
        &self,
        command: ControlCommand,
        event_id: &str,
        message: &InboundMessage,
        state: &mut ConversationState,
    ) -> Turn {
        let author = message.author.as_str();
        match command {
            ControlCommand::SetMode(mode) => {
                state.execution_mode = Some(mode);
                state.pending_plan = None;
                self.telemetry.record(
                    TelemetryEvent::new("mode_changed", event_id)
                        .with("author", author)
                        .with("nextMode", mode.as_str()),
                );
                Turn::Reply(format!("✅ Execution mode set to {}.", mode))
            }
            ControlCommand::SetExperience(experience) => {
                state.experience_mode = experience;
                self.telemetry.record(
                    TelemetryEvent::new("experience_mode_changed", event_id)
                        .with("author", author)
                        .with("nextExperience", experience.as_str()),
                );
                Turn::Reply(format!("✅ Experience mode set to {}.", experience))
            }
            ControlCommand::Cancel => {
                let cancelled = state.pending_plan.take().map(|plan| plan.id);
                self.telemetry.record(
                    TelemetryEvent::new("plan_cancelled", event_id)
                        .with("author", author)
                        .with("planId", cancelled),
                );
                Turn::Reply("Cancelled pending plan.".to_string())
            }
            ControlCommand::Replay(id) => match self.replay.lookup(&id, self.clock.now()) {
                ReplayLookup::Found(command) => {
                    self.telemetry.record(
                        TelemetryEvent::new("replay_started", event_id)
                            .with("replayId", &id)
                            .with("author", author),
                    );
                    Turn::Replay { id, command }
                }
                ReplayLookup::NotFound => {
                    self.replay_rejected(event_id, &id, "not_found");
                    Turn::Reply(format!("Replay id not found: {}", id))
                }
                ReplayLookup::Expired => {
                    self.replay_rejected(event_id, &id, "expired");
                    Turn::Reply(format!("Replay id expired: {}", id))
                }
            },
            ControlCommand::Approve(requested) => {
                let response = match self.approve(requested, event_id, message, state).await {
                    Ok(response) => response,
                    Err(err) => {
                        self.telemetry.record(
                            TelemetryEvent::new("plan_rejected", event_id)
                                .with("author", author)
                                .with("reason", err.to_string()),
                        );
                        err.to_string()
                    }
                };
                Turn::Reply(response)
            }
        }
    }

    fn replay_rejected(&self, event_id: &str, replay_id: &str, reason: &str) {
        self.telemetry.record(
            TelemetryEvent::new("replay_rejected", event_id)
                .with("replayId", replay_id)
                .with("reason", reason),
        );
    }

    /// Execute the pending plan
    ///
    /// Mismatch leaves the plan in place; expiry and a policy denial clear it.
    async fn approve(
        &self,
        requested: Option<String>,
        event_id: &str,
        message: &InboundMessage,
        state: &mut ConversationState,
    ) -> Result<String, PipelineError> {
        let plan = state
            .pending_plan
            .clone()
            .ok_or(PipelineError::NoPendingPlan)?;
        let plan_id = requested.unwrap_or_else(|| plan.id.clone());
        if plan_id != plan.id {
            return Err(PipelineError::PlanMismatch { expected: plan.id });
        }

        let now = self.clock.now();
        if plan.is_expired(now) {
            state.pending_plan = None;
            return Err(PipelineError::PlanExpired { plan_id });
        }

        // Advisor plans are disclosure only and stay non-executable
        let mode = state.execution_mode_or(self.config.default_execution_mode);
        let gate_mode = match mode {
            ExecutionMode::Advisor => ExecutionMode::Advisor,
            _ => ExecutionMode::Execute,
        };
        let decision = self
            .policy
            .evaluate(&PolicyRequest::new(&plan.params, gate_mode));
        if !decision.allowed {
            state.pending_plan = None;
            return Err(PipelineError::PolicyDenied {
                intent: plan.intent.to_string(),
                reasons: decision.reasons,
            });
        }

        let ctx = IntentContext {
            message,
            mode: ExecutionMode::Execute,
            approved_plan_id: Some(&plan.id),
            config: &self.config,
            now,
        };
        let outcome = intents::execute(&plan.params, &ctx, &self.tools).await;
        state.apply(outcome.update, now);
        state.pending_plan = None;

        tracing::info!(plan_id = %plan.id, intent = %plan.intent, "Plan executed");
        self.telemetry.record(
            TelemetryEvent::new("plan_executed", event_id)
                .with("planId", &plan.id)
                .with("intent", plan.intent.as_str())
                .with("author", &message.author),
        );
        Ok(outcome.response)
    }

    // ========================================================================
    // Intent Pipeline
    // ========================================================================

    async fn handle_intent(
        &self,
        event_id: &str,
        message: &InboundMessage,
        state: &mut ConversationState,
    ) -> String {
        let now = self.clock.now();
        let mode = state.execution_mode_or(self.config.default_execution_mode);
        let hands_off = state.experience_mode == ExperienceMode::HandsOff;

        let Some(resolved) = self.resolve(event_id, message, hands_off).await else {
            self.telemetry.record(
                TelemetryEvent::new("intent_unresolved", event_id)
                    .with("author", &message.author)
                    .with("text", &message.text),
            );
            return UNRESOLVED.to_string();
        };

        let resolved = match self.confidence_gate(event_id, message, resolved, hands_off).await {
            Ok(resolved) => resolved,
            Err(response) => return response,
        };
        let intent = resolved.intent();

        tracing::debug!(
            intent = %intent,
            source = %resolved.source,
            confidence = resolved.confidence,
            "Intent resolved"
        );
        self.replay
            .register(ReplayableCommand::from_message(event_id, message, now));

        let plan_only = intent.is_action()
            && (mode.requires_plan() || self.policy.requires_approval(intent));
        // An advisor turn that only discloses a plan is gated like a draft
        let gate_mode = if plan_only && mode == ExecutionMode::Advisor {
            ExecutionMode::Draft
        } else {
            mode
        };
        let decision = self
            .policy
            .evaluate(&PolicyRequest::new(&resolved.params, gate_mode));
        if !decision.allowed {
            self.telemetry.record(
                TelemetryEvent::new("policy_block", event_id)
                    .with("intent", intent.as_str())
                    .with("reasons", &decision.reasons),
            );
            return PipelineError::PolicyDenied {
                intent: intent.to_string(),
                reasons: decision.reasons,
            }
            .to_string();
        }

        if plan_only {
            return self.propose(event_id, resolved, &decision.warnings, mode, now, state);
        }

        let ctx = IntentContext {
            message,
            mode,
            approved_plan_id: None,
            config: &self.config,
            now,
        };
        let outcome = intents::execute(&resolved.params, &ctx, &self.tools).await;
        self.telemetry.record(
            TelemetryEvent::new("intent_executed", event_id)
                .with("intent", intent.as_str())
                .with("confidence", resolved.confidence)
                .with("source", resolved.source.to_string())
                .with("mode", mode.as_str()),
        );
        state.apply(outcome.update, now);
        outcome.response
    }

    /// Deterministic match first; the assistant only in hands-off mode
    async fn resolve(
        &self,
        event_id: &str,
        message: &InboundMessage,
        hands_off: bool,
    ) -> Option<ResolvedIntent> {
        if let Some(resolved) = intents::resolve(&message.text) {
            return Some(resolved);
        }
        if !hands_off {
            return None;
        }

        let assisted = self.assistant.assist(&message.text).await?;
        self.telemetry.record(
            TelemetryEvent::new("hands_off_assisted_parse", event_id)
                .with("suggestedIntent", assisted.intent().as_str())
                .with("confidence", assisted.confidence)
                .with("source", assisted.source.to_string()),
        );
        Some(assisted.to_resolved())
    }

    /// Accept, replace or reject a low-confidence resolution
    ///
    /// `Err` carries the response to return instead of executing.
    async fn confidence_gate(
        &self,
        event_id: &str,
        message: &InboundMessage,
        mut resolved: ResolvedIntent,
        hands_off: bool,
    ) -> Result<ResolvedIntent, String> {
        let min = self.config.min_parse_confidence;
        if resolved.confidence >= min {
            return Ok(resolved);
        }

        if hands_off {
            if let Some(assisted) = self.assistant.assist(&message.text).await {
                if assisted.confidence < self.config.hands_off_min_confidence {
                    return Err(format_assisted_suggestion(&assisted));
                }
                resolved = assisted.to_resolved();
            }
        }

        if resolved.confidence < min {
            self.telemetry.record(
                TelemetryEvent::new("intent_low_confidence", event_id)
                    .with("intent", resolved.intent().as_str())
                    .with("confidence", resolved.confidence)
                    .with("text", &message.text),
            );
            return Err(low_confidence_prompt(resolved.intent(), resolved.confidence));
        }
        Ok(resolved)
    }

    /// Store a plan as the user's pending plan and render it
    fn propose(
        &self,
        event_id: &str,
        resolved: ResolvedIntent,
        warnings: &[String],
        mode: ExecutionMode,
        now: DateTime<Utc>,
        state: &mut ConversationState,
    ) -> String {
        let intent = resolved.intent();
        let plan = create_action_plan(
            resolved.params,
            warnings,
            resolved.confidence,
            now,
            self.config.plan_ttl,
        );
        let rendered = format_plan(&plan);

        self.telemetry.record(
            TelemetryEvent::new("plan_created", event_id)
                .with("planId", &plan.id)
                .with("intent", intent.as_str())
                .with("mode", mode.as_str()),
        );
        tracing::info!(plan_id = %plan.id, intent = %intent, mode = %mode, "Plan created");
        state.pending_plan = Some(plan);

        match mode {
            ExecutionMode::Advisor => format!("Advisor mode is active.\n\n{}", rendered),
            ExecutionMode::Draft => format!("Draft mode is active.\n\n{}", rendered),
            ExecutionMode::Execute => rendered,
        }
    }
}

fn low_confidence_prompt(intent: IntentName, confidence: f64) -> String {
    format!(
        "I may have misunderstood that ({}, confidence {:.2}). Please confirm with a clearer command, e.g. \"analyze owner/repo\" or \"pay 10 NEAR to owner/repo\".",
        intent, confidence
    )
}
