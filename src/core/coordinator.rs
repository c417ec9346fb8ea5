//! The session coordinator: owns the turn lifecycle end to end.
//!
//! A turn moves through a fixed set of phases. The text is classified,
//! routed to a tool or a specialist capability, and everything either
//! side proposes is committed through the guardrail gate or discarded
//! whole. The live record is only replaced after a staged copy has
//! absorbed every change, so a failing or rejected turn leaves the
//! session exactly as it found it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use crate::adapters::{CompletionService, Intent, Understanding};
use crate::capabilities::{CapabilityKind, CapabilityRegistry};
use crate::config::CoachConfig;
use crate::domain::{
    ChangeOp, ChangeSet, ConversationState, EscalationPhase, EscalationState, HandoffEntry,
    SessionRecord, Topic, TurnResponse, Urgency,
};
use crate::store::{SessionStore, StoreError};
use crate::tools::{ToolError, ToolParams, ToolRegistry, ToolRunner};

use super::conversation::ConversationTracker;
use super::guardrails::{GuardrailEngine, GuardrailOutcome};
use super::hooks::{HookDispatcher, LoggingHook, SessionHook};
use super::retry::RetryPolicy;
use super::router::{Router, RoutingDecision};

/// Idle sessions are dropped from the in-memory map past this count and
/// reload from the store on their next turn.
const SESSION_CACHE_LIMIT: usize = 256;

/// Where a turn currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Routing,
    ToolExecuting,
    HandoffPending,
    AwaitingSpecialist,
    Committing,
    Done,
}

impl TurnPhase {
    fn as_str(self) -> &'static str {
        match self {
            TurnPhase::Routing => "routing",
            TurnPhase::ToolExecuting => "tool_executing",
            TurnPhase::HandoffPending => "handoff_pending",
            TurnPhase::AwaitingSpecialist => "awaiting_specialist",
            TurnPhase::Committing => "committing",
            TurnPhase::Done => "done",
        }
    }
}

pub struct SessionCoordinator {
    store: Arc<dyn SessionStore>,
    understanding: Arc<dyn Understanding>,
    tools: ToolRegistry,
    capabilities: CapabilityRegistry,
    guardrails: GuardrailEngine,
    router: Router,
    tracker: ConversationTracker,
    runner: ToolRunner,
    hooks: HookDispatcher,
    /// Per-session locks; one turn at a time per session
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<SessionRecord>>>>,
}

impl SessionCoordinator {
    pub fn new(
        config: CoachConfig,
        store: Arc<dyn SessionStore>,
        understanding: Arc<dyn Understanding>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let mut hooks = HookDispatcher::new();
        hooks.register(Arc::new(LoggingHook));
        let router = Router::new(
            config.routing,
            config.guardrails.high_risk_conditions.clone(),
        );
        Self {
            store,
            understanding,
            tools: ToolRegistry::with_defaults(completion),
            capabilities: CapabilityRegistry::with_defaults(),
            guardrails: GuardrailEngine::new(config.guardrails),
            router,
            tracker: ConversationTracker::new(),
            runner: ToolRunner::new(RetryPolicy::from(&config.retry)),
            hooks,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the tool table, mainly to inject flaky backends in tests
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityRegistry) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn register_hook(&mut self, hook: Arc<dyn SessionHook>) {
        self.hooks.register(hook);
    }

    /// A snapshot of the session record as the coordinator sees it
    pub async fn session(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let entry = self.entry(session_id)?;
        let record = entry.lock().await;
        Ok(record.clone())
    }

    fn entry(&self, session_id: &str) -> Result<Arc<tokio::sync::Mutex<SessionRecord>>, StoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| StoreError::Unavailable("session map lock poisoned".to_string()))?;
        if let Some(entry) = sessions.get(session_id) {
            return Ok(entry.clone());
        }
        if sessions.len() >= SESSION_CACHE_LIMIT {
            // Entries still held by an in-flight turn survive eviction
            sessions.retain(|_, entry| Arc::strong_count(entry) > 1);
        }
        let record = self
            .store
            .load(session_id)?
            .unwrap_or_else(|| SessionRecord::new(session_id));
        let entry = Arc::new(tokio::sync::Mutex::new(record));
        sessions.insert(session_id.to_string(), entry.clone());
        Ok(entry)
    }

    #[cfg(test)]
    fn cached_sessions(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Runs one full turn for a session.
    ///
    /// Only a failing session load is fatal. Every downstream failure
    /// turns into a conversational response and the record stays put.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<TurnResponse, StoreError> {
        let entry = self.entry(session_id)?;
        let mut record = entry.lock().await;
        self.hooks.turn_start(&record, text);

        let response = self.run_turn(&mut record, text).await;

        self.hooks.turn_end(&record);
        Ok(response)
    }

    async fn run_turn(&self, record: &mut SessionRecord, text: &str) -> TurnResponse {
        self.trace_phase(record, TurnPhase::Routing);

        let intent = match self.understanding.classify_intent(text).await {
            Ok(intent) => intent,
            Err(e) => {
                debug!(error = %e, "intent classification failed");
                let mut staged = record.clone();
                staged.conversation.failed_clarifications += 1;
                return self.finish_clarify(record, staged);
            }
        };

        // All turn work happens on a staged copy; the live record is
        // only replaced when the turn commits.
        let mut staged = record.clone();
        Self::absorb_intent(&mut staged.conversation, &intent);

        let decision = self.router.route(&intent, &staged);
        match decision {
            RoutingDecision::Handoff {
                target,
                reason,
                urgency,
            } => {
                self.run_handoff(record, staged, text, target, reason, urgency)
                    .await
            }
            RoutingDecision::Tool(kind) => {
                // Unsafe goal language is refused before any checklist
                // interrogation
                if staged.conversation.topic == Some(Topic::GoalSetting) {
                    if let Err(reason) = self.guardrails.check_goal_text(text) {
                        return Self::refusal(reason);
                    }
                }

                let topic = staged.conversation.topic.unwrap_or(Topic::General);
                let check = self.tracker.analyze(topic, &staged.conversation.known_fields);
                if !check.is_satisfied() {
                    staged.conversation.missing_fields = check.missing_fields.clone();
                    staged.conversation.pending_questions = check.follow_up_questions.clone();
                    let questions = check.follow_up_questions;
                    let response = TurnResponse::text(
                        "coordinator",
                        "I need a little more detail before I can help with that.",
                    )
                    .with_questions(questions);
                    return self.commit(record, staged, response);
                }

                self.run_tool(record, staged, text, kind).await
            }
            RoutingDecision::Clarify => {
                staged.conversation.failed_clarifications += 1;
                self.finish_clarify(record, staged)
            }
        }
    }

    async fn run_tool(
        &self,
        record: &mut SessionRecord,
        mut staged: SessionRecord,
        text: &str,
        kind: crate::tools::ToolKind,
    ) -> TurnResponse {
        let Some(tool) = self.tools.get(kind) else {
            warn!(tool = kind.name(), "no handler registered");
            return TurnResponse::text(
                "coordinator",
                "I can't handle that request right now.",
            );
        };

        self.trace_phase(&staged, TurnPhase::ToolExecuting);
        self.hooks.tool_start(&staged, kind);

        let params = ToolParams::new(text, staged.conversation.known_fields.clone());
        let result = self
            .runner
            .invoke(tool.as_ref(), params, &staged, &self.guardrails)
            .await;
        self.hooks.tool_end(&staged, kind, result.is_ok());

        let output = match result {
            Ok(output) => output,
            Err(ToolError::Rejected(reason)) => return Self::refusal(reason),
            Err(ToolError::InvalidInput(message)) => {
                return TurnResponse::text("coordinator", message)
            }
            Err(e) => {
                warn!(tool = kind.name(), error = %e, "tool failed");
                return TurnResponse::text(
                    "coordinator",
                    "Something went wrong on my end while working on that. Mind trying again in a moment?",
                );
            }
        };

        match self.guardrails.check(&output.changes, &staged) {
            GuardrailOutcome::Reject(reason) => return Self::refusal(reason),
            GuardrailOutcome::Accept => {}
        }

        if let Err(e) = staged.apply(&output.changes) {
            warn!(tool = kind.name(), error = %e, "change set failed to apply");
            return TurnResponse::text(
                "coordinator",
                "Something went wrong on my end while working on that. Mind trying again in a moment?",
            );
        }
        staged.metrics.tool_calls += 1;

        // Checklist satisfied and acted on; start the next topic fresh
        let topic = staged.conversation.topic;
        staged.conversation = ConversationState {
            topic,
            ..Default::default()
        };

        let response = TurnResponse::text(kind.name(), output.text).with_payload(output.payload);
        self.commit(record, staged, response)
    }

    async fn run_handoff(
        &self,
        record: &mut SessionRecord,
        mut staged: SessionRecord,
        text: &str,
        target: CapabilityKind,
        reason: String,
        urgency: Urgency,
    ) -> TurnResponse {
        self.trace_phase(&staged, TurnPhase::HandoffPending);
        self.hooks.handoff(&staged, target, urgency);

        let Some(capability) = self.capabilities.get(target) else {
            warn!(target = %target, "no capability registered");
            return self.queue_unreachable_handoff(record, staged, target, reason, urgency);
        };

        self.trace_phase(&staged, TurnPhase::AwaitingSpecialist);
        let reply = match capability.handle(text, &staged, urgency, &reason).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(target = %target, error = %e, "capability failed");
                return self.queue_unreachable_handoff(record, staged, target, reason, urgency);
            }
        };

        let mut changes = reply.changes;
        changes.push(ChangeOp::LogHandoff(HandoffEntry {
            at: Utc::now(),
            from: "coordinator".to_string(),
            to: target.name().to_string(),
            reason,
            urgency,
        }));

        match self.guardrails.check(&changes, &staged) {
            GuardrailOutcome::Reject(reason) => return Self::refusal(reason),
            GuardrailOutcome::Accept => {}
        }
        if let Err(e) = staged.apply(&changes) {
            warn!(target = %target, error = %e, "handoff changes failed to apply");
            return TurnResponse::text(
                "coordinator",
                "Something went wrong on my end while working on that. Mind trying again in a moment?",
            );
        }

        let response = TurnResponse::text(target.name(), reply.text).with_payload(reply.payload);
        self.commit(record, staged, response)
    }

    /// The specialist could not take the turn. The attempted handoff is
    /// still logged and the session is queued for human review, so the
    /// request is not silently dropped.
    fn queue_unreachable_handoff(
        &self,
        record: &mut SessionRecord,
        mut staged: SessionRecord,
        target: CapabilityKind,
        reason: String,
        urgency: Urgency,
    ) -> TurnResponse {
        let now = Utc::now();
        let mut changes = ChangeSet::single(ChangeOp::LogHandoff(HandoffEntry {
            at: now,
            from: "coordinator".to_string(),
            to: target.name().to_string(),
            reason: reason.clone(),
            urgency,
        }));
        changes.push(ChangeOp::SetEscalation(EscalationState {
            status: EscalationPhase::PendingReview,
            detail: format!("specialist {} unreachable: {}", target.name(), reason),
            at: now,
        }));

        if let Err(e) = staged.apply(&changes) {
            warn!(target = %target, error = %e, "escalation queue failed to apply");
            return TurnResponse::text(
                "coordinator",
                "Something went wrong on my end while working on that. Mind trying again in a moment?",
            );
        }

        let response = TurnResponse::text(
            "coordinator",
            "I couldn't reach the right specialist just now, so I've flagged this for a human coach to follow up with you.",
        );
        self.commit(record, staged, response)
    }

    fn finish_clarify(&self, record: &mut SessionRecord, mut staged: SessionRecord) -> TurnResponse {
        let question =
            "I can help with goals, meal plans, workouts, progress tracking, and check-ins. What would you like to work on?";
        staged.conversation.pending_questions = vec![question.to_string()];
        let response = TurnResponse::text("coordinator", "I'm not sure what you'd like to do.")
            .with_questions(vec![question.to_string()]);
        self.commit(record, staged, response)
    }

    /// Swaps the staged record in and persists it. A failing save is
    /// logged and the turn still answers; the in-memory record stays
    /// authoritative until the next successful save.
    fn commit(
        &self,
        record: &mut SessionRecord,
        mut staged: SessionRecord,
        response: TurnResponse,
    ) -> TurnResponse {
        self.trace_phase(&staged, TurnPhase::Committing);
        staged.last_interaction = Some(Utc::now());
        *record = staged;
        if let Err(e) = self.store.save(record) {
            warn!(session = %record.id, error = %e, "session save failed");
        }
        self.trace_phase(record, TurnPhase::Done);
        response
    }

    fn refusal(reason: super::guardrails::RejectReason) -> TurnResponse {
        TurnResponse::text("guardrails", reason.to_string())
            .with_payload(json!({ "code": reason.code() }))
    }

    fn absorb_intent(conversation: &mut ConversationState, intent: &Intent) {
        if let Some(topic) = intent.topic {
            if conversation.topic != Some(topic) {
                *conversation = ConversationState {
                    topic: Some(topic),
                    ..Default::default()
                };
            }
            conversation
                .known_fields
                .extend(intent.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            conversation.failed_clarifications = 0;
        }
    }

    fn trace_phase(&self, record: &SessionRecord, phase: TurnPhase) {
        debug!(session = %record.id, phase = phase.as_str(), "turn phase");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{CannedCompletion, KeywordUnderstanding};
    use crate::store::MemoryStore;

    fn coordinator() -> SessionCoordinator {
        let config = CoachConfig::default();
        let understanding = Arc::new(KeywordUnderstanding::new(config.routing.clone()));
        SessionCoordinator::new(
            config,
            Arc::new(MemoryStore::new()),
            understanding,
            Arc::new(CannedCompletion),
        )
    }

    #[tokio::test]
    async fn test_unknown_text_asks_for_direction() {
        let coordinator = coordinator();
        let response = coordinator.handle_turn("u1", "hmm").await.unwrap();
        assert_eq!(response.handled_by, "coordinator");
        assert_eq!(response.follow_up_questions.len(), 1);

        let record = coordinator.session("u1").await.unwrap();
        assert_eq!(record.conversation.failed_clarifications, 1);
        assert_eq!(record.metrics.tool_calls, 0);
    }

    #[tokio::test]
    async fn test_unreachable_specialist_queues_human_review() {
        let coordinator = coordinator().with_capabilities(CapabilityRegistry::empty());
        let response = coordinator
            .handle_turn("u1", "I have severe chest pain")
            .await
            .unwrap();
        assert_eq!(response.handled_by, "coordinator");
        assert!(response.text.contains("human coach"));

        let record = coordinator.session("u1").await.unwrap();
        assert_eq!(record.handoff_log.len(), 1);
        assert_eq!(record.handoff_log[0].to, "escalation");
        let escalation = record.escalation.expect("escalation queued");
        assert_eq!(escalation.status, EscalationPhase::PendingReview);
    }

    #[tokio::test]
    async fn test_idle_sessions_evicted_past_cache_limit() {
        let coordinator = coordinator();
        for i in 0..SESSION_CACHE_LIMIT + 40 {
            let id = format!("s{}", i);
            coordinator.handle_turn(&id, "hmm").await.unwrap();
        }
        assert!(coordinator.cached_sessions() <= SESSION_CACHE_LIMIT + 1);

        // Evicted sessions reload from the store with their state intact
        let record = coordinator.session("s0").await.unwrap();
        assert_eq!(record.conversation.failed_clarifications, 1);
    }

    #[tokio::test]
    async fn test_fields_accumulate_across_turns() {
        let coordinator = coordinator();
        let first = coordinator
            .handle_turn("u1", "I want to lose 5 kg")
            .await
            .unwrap();
        assert_eq!(first.follow_up_questions.len(), 1);

        let second = coordinator
            .handle_turn("u1", "I'd like to lose it over 10 weeks")
            .await
            .unwrap();
        assert_eq!(second.handled_by, "goal_analyzer");

        let record = coordinator.session("u1").await.unwrap();
        assert_eq!(record.goals.len(), 1);
        assert_eq!(record.metrics.tool_calls, 1);
    }
}
