//! Commit-gate guarantees: rejected turns leave the record untouched,
//! handoff bookkeeping stays consistent, and escalation wins routing.

use std::sync::Arc;

use wellspring::adapters::{CannedCompletion, KeywordUnderstanding};
use wellspring::config::CoachConfig;
use wellspring::core::SessionCoordinator;
use wellspring::domain::{ChangeOp, ChangeSet, Goal, SessionRecord};
use wellspring::store::{MemoryStore, SessionStore};

fn coordinator_with_store(store: Arc<MemoryStore>) -> SessionCoordinator {
    let mut config = CoachConfig::default();
    config.retry.initial_delay_ms = 1;
    let understanding = Arc::new(KeywordUnderstanding::new(config.routing.clone()));
    SessionCoordinator::new(config, store, understanding, Arc::new(CannedCompletion))
}

fn seeded_record(id: &str) -> SessionRecord {
    let mut record = SessionRecord::new(id);
    record.profile.age = Some(34);
    record.profile.height_cm = Some(175.0);
    record.profile.weight_kg = Some(82.0);
    record.profile.recompute_bmi();
    record
        .apply(&ChangeSet::single(ChangeOp::AddGoal(Goal::new(
            "weight_loss",
            "lose 6 kg over 12 weeks",
            6.0,
            12,
        ))))
        .unwrap();
    record
}

#[tokio::test]
async fn test_rejected_turn_leaves_record_byte_identical() {
    let store = Arc::new(MemoryStore::new());
    store.save(&seeded_record("u1")).unwrap();
    let coordinator = coordinator_with_store(store.clone());

    let before = serde_json::to_string(&coordinator.session("u1").await.unwrap()).unwrap();

    let response = coordinator
        .handle_turn("u1", "actually I want to lose weight really fast")
        .await
        .unwrap();
    assert_eq!(response.payload["code"], "unsafe_pace_request");

    let after = serde_json::to_string(&coordinator.session("u1").await.unwrap()).unwrap();
    assert_eq!(before, after);

    // The store was not written to either
    let stored = serde_json::to_string(&store.load("u1").unwrap().unwrap()).unwrap();
    assert_eq!(before, stored);
}

#[tokio::test]
async fn test_unsafe_weekly_rate_refuses_goal() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator_with_store(store);

    let response = coordinator
        .handle_turn("u1", "I want to lose 10 kg in 2 weeks")
        .await
        .unwrap();
    assert_eq!(response.handled_by, "guardrails");
    assert_eq!(response.payload["code"], "unsafe_progression_rate");

    let record = coordinator.session("u1").await.unwrap();
    assert!(record.goals.is_empty());
    assert_eq!(record.metrics.tool_calls, 0);
}

#[tokio::test]
async fn test_escalation_outranks_injury_support() {
    let store = Arc::new(MemoryStore::new());
    let mut record = SessionRecord::new("u1");
    record
        .profile
        .medical_conditions
        .push("heart_disease".to_string());
    store.save(&record).unwrap();
    let coordinator = coordinator_with_store(store);

    // Injury language plus a workout topic would normally pick injury
    // support, but the high-risk profile escalates instead.
    let response = coordinator
        .handle_turn("u1", "I injured my knee, can you adjust my workout?")
        .await
        .unwrap();
    assert_eq!(response.handled_by, "escalation");

    let record = coordinator.session("u1").await.unwrap();
    assert_eq!(record.handoff_log.len(), 1);
    assert_eq!(record.handoff_log[0].to, "escalation");
}

#[tokio::test]
async fn test_handoff_counter_matches_log_length() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator_with_store(store);

    coordinator
        .handle_turn("u1", "I think I pulled a muscle in my shoulder")
        .await
        .unwrap();
    coordinator
        .handle_turn("u1", "I have severe chest pain")
        .await
        .unwrap();

    let record = coordinator.session("u1").await.unwrap();
    assert_eq!(record.metrics.handoffs as usize, record.handoff_log.len());
    assert_eq!(record.handoff_log.len(), 2);
}

#[tokio::test]
async fn test_progress_updates_keep_history_sorted_and_bmi_current() {
    let store = Arc::new(MemoryStore::new());
    store.save(&seeded_record("u1")).unwrap();
    let coordinator = coordinator_with_store(store);

    coordinator
        .handle_turn("u1", "I weighed in at 81.2 kg today")
        .await
        .unwrap();
    coordinator
        .handle_turn("u1", "I weighed in at 80.6 kg today")
        .await
        .unwrap();

    let record = coordinator.session("u1").await.unwrap();
    assert_eq!(record.progress_history.len(), 2);
    assert!(record
        .progress_history
        .windows(2)
        .all(|pair| pair[0].date <= pair[1].date));

    // Profile weight and BMI track the newest entry
    assert_eq!(record.profile.weight_kg, Some(80.6));
    let bmi = record.profile.bmi.expect("bmi derived");
    assert!((bmi - 80.6 / (1.75f64 * 1.75)).abs() < 0.01);
}

#[tokio::test]
async fn test_repeated_unusable_turns_escalate() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator_with_store(store);

    for _ in 0..3 {
        let response = coordinator.handle_turn("u1", "hmm").await.unwrap();
        assert_eq!(response.handled_by, "coordinator");
    }
    let response = coordinator.handle_turn("u1", "hmm").await.unwrap();
    assert_eq!(response.handled_by, "escalation");
}
