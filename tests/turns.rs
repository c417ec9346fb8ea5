//! End-to-end turn handling through the coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use wellspring::adapters::{
    AdapterError, CannedCompletion, CompletionService, KeywordUnderstanding,
};
use wellspring::config::CoachConfig;
use wellspring::core::SessionCoordinator;
use wellspring::domain::{EscalationPhase, GoalStatus};
use wellspring::store::MemoryStore;
use wellspring::tools::ToolRegistry;

fn coordinator_with_store(store: Arc<MemoryStore>) -> SessionCoordinator {
    let mut config = CoachConfig::default();
    config.retry.initial_delay_ms = 1;
    let understanding = Arc::new(KeywordUnderstanding::new(config.routing.clone()));
    SessionCoordinator::new(config, store, understanding, Arc::new(CannedCompletion))
}

fn coordinator() -> SessionCoordinator {
    coordinator_with_store(Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn test_vague_fast_goal_is_refused() {
    let coordinator = coordinator();
    let response = coordinator
        .handle_turn("u1", "I want to lose weight very fast this week")
        .await
        .unwrap();

    assert_eq!(response.handled_by, "guardrails");
    assert_eq!(response.payload["code"], "unsafe_pace_request");

    let record = coordinator.session("u1").await.unwrap();
    assert!(record.goals.is_empty());
    assert_eq!(record.metrics.tool_calls, 0);
}

#[tokio::test]
async fn test_concrete_goal_is_accepted() {
    let coordinator = coordinator();
    let response = coordinator
        .handle_turn("u1", "I want to lose 4 kg over 8 weeks")
        .await
        .unwrap();

    assert_eq!(response.handled_by, "goal_analyzer");
    assert!(response.follow_up_questions.is_empty());

    let record = coordinator.session("u1").await.unwrap();
    assert_eq!(record.goals.len(), 1);
    let goal = &record.goals[0];
    assert_eq!(goal.status, GoalStatus::Active);
    assert_eq!(goal.target_value, 4.0);
    assert_eq!(goal.timeframe_weeks, 8);
    assert!((goal.weekly_rate() - 0.5).abs() < 1e-9);
    assert_eq!(record.metrics.tool_calls, 1);
}

#[tokio::test]
async fn test_chest_pain_escalates_with_high_urgency() {
    let coordinator = coordinator();
    let response = coordinator
        .handle_turn("u1", "I have severe chest pain right now")
        .await
        .unwrap();

    assert_eq!(response.handled_by, "escalation");
    assert_eq!(response.payload["urgency"], "high");

    let record = coordinator.session("u1").await.unwrap();
    let escalation = record.escalation.as_ref().expect("escalation recorded");
    assert_eq!(escalation.status, EscalationPhase::PendingReview);
    assert_eq!(record.metrics.handoffs, 1);
    assert_eq!(record.handoff_log.len(), 1);
    assert_eq!(record.metrics.tool_calls, 0);
}

#[tokio::test]
async fn test_missing_timeframe_asks_exactly_one_question() {
    let coordinator = coordinator();
    let response = coordinator
        .handle_turn("u1", "I want to lose 5 kg")
        .await
        .unwrap();

    assert_eq!(response.follow_up_questions.len(), 1);
    assert!(response.follow_up_questions[0]
        .to_lowercase()
        .contains("how much time"));

    let record = coordinator.session("u1").await.unwrap();
    assert_eq!(record.metrics.tool_calls, 0);
    assert!(record.goals.is_empty());
    assert_eq!(record.conversation.known_fields.get("target").unwrap(), "5");
}

#[tokio::test]
async fn test_huge_timeframe_answers_instead_of_failing() {
    let coordinator = coordinator();
    let response = coordinator
        .handle_turn("u1", "I want to lose 4 kg over 700000000 weeks")
        .await
        .unwrap();

    assert_eq!(response.handled_by, "coordinator");
    assert!(response.text.contains("weeks or less"));

    let record = coordinator.session("u1").await.unwrap();
    assert!(record.goals.is_empty());
    assert_eq!(record.metrics.tool_calls, 0);
}

/// Completion backend that fails transiently a fixed number of times.
struct FlakyCompletion {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyCompletion {
    fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompletionService for FlakyCompletion {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(AdapterError::Transient("backend hiccup".to_string()));
        }
        Ok("Steady as she goes.".to_string())
    }
}

#[tokio::test]
async fn test_transient_failures_retry_and_count_one_call() {
    let completion = Arc::new(FlakyCompletion::new(2));
    let mut config = CoachConfig::default();
    config.retry.initial_delay_ms = 1;
    let understanding = Arc::new(KeywordUnderstanding::new(config.routing.clone()));
    let coordinator = SessionCoordinator::new(
        config,
        Arc::new(MemoryStore::new()),
        understanding,
        Arc::new(CannedCompletion),
    )
    .with_tools(ToolRegistry::with_defaults(completion.clone()));

    let response = coordinator
        .handle_turn("u1", "I want to lose 4 kg over 8 weeks")
        .await
        .unwrap();
    assert_eq!(response.handled_by, "goal_analyzer");
    assert_eq!(completion.calls.load(Ordering::SeqCst), 3);

    let record = coordinator.session("u1").await.unwrap();
    assert_eq!(record.metrics.tool_calls, 1);
    assert_eq!(record.goals.len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_leave_record_unchanged() {
    let completion = Arc::new(FlakyCompletion::new(10));
    let mut config = CoachConfig::default();
    config.retry.initial_delay_ms = 1;
    let understanding = Arc::new(KeywordUnderstanding::new(config.routing.clone()));
    let coordinator = SessionCoordinator::new(
        config,
        Arc::new(MemoryStore::new()),
        understanding,
        Arc::new(CannedCompletion),
    )
    .with_tools(ToolRegistry::with_defaults(completion));

    let response = coordinator
        .handle_turn("u1", "I want to lose 4 kg over 8 weeks")
        .await
        .unwrap();
    assert_eq!(response.handled_by, "coordinator");

    let record = coordinator.session("u1").await.unwrap();
    assert_eq!(record.metrics.tool_calls, 0);
    assert!(record.goals.is_empty());
}

#[tokio::test]
async fn test_session_persists_across_turns() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator_with_store(store.clone());
    coordinator
        .handle_turn("alice", "I want to lose 4 kg over 8 weeks")
        .await
        .unwrap();

    use wellspring::store::SessionStore;
    let saved = store.load("alice").unwrap().expect("session saved");
    assert_eq!(saved.goals.len(), 1);
}
