//! Escalation to a human coach.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::domain::{
    ChangeOp, ChangeSet, EscalationPhase, EscalationState, SessionRecord, Urgency,
};

use super::{Capability, CapabilityError, CapabilityKind, CapabilityReply};

/// Packages session context for a human coach and parks the session
/// in pending review until one responds.
pub struct EscalationDesk;

impl EscalationDesk {
    fn summary(record: &SessionRecord, query: &str, reason: &str, urgency: Urgency) -> serde_json::Value {
        json!({
            "urgency": urgency.to_string(),
            "reason": reason,
            "latest_message": query,
            "profile": {
                "age": record.profile.age,
                "weight_kg": record.profile.weight_kg,
                "medical_conditions": record.profile.medical_conditions,
            },
            "active_goal": record.active_goal().map(|g| json!({
                "goal_type": g.goal_type,
                "target_value": g.target_value,
                "timeframe_weeks": g.timeframe_weeks,
            })),
            "recent_progress": record.progress_history.iter().rev().take(3)
                .map(|e| json!({
                    "date": e.date.format("%Y-%m-%d").to_string(),
                    "weight_kg": e.weight_kg,
                }))
                .collect::<Vec<_>>(),
        })
    }
}

#[async_trait]
impl Capability for EscalationDesk {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Escalation
    }

    async fn handle(
        &self,
        query: &str,
        record: &SessionRecord,
        urgency: Urgency,
        reason: &str,
    ) -> Result<CapabilityReply, CapabilityError> {
        let payload = Self::summary(record, query, reason, urgency);

        let text = match urgency {
            Urgency::High => {
                "This sounds serious, and it's beyond what I can safely help with. \
                 If you're in immediate danger, call your local emergency number now. \
                 I've flagged your session for a human coach to review right away."
            }
            Urgency::Medium => {
                "Given your health history, I'd rather a human coach look at this before \
                 we go further. I've flagged your session for review."
            }
            Urgency::Low => {
                "I'm having trouble helping with this one, so I've flagged your session \
                 for a human coach to pick up."
            }
        }
        .to_string();

        let escalation = EscalationState {
            status: EscalationPhase::PendingReview,
            detail: reason.to_string(),
            at: Utc::now(),
        };

        Ok(CapabilityReply {
            text,
            payload,
            changes: ChangeSet::single(ChangeOp::SetEscalation(escalation)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_high_urgency_sets_pending_review() {
        let desk = EscalationDesk;
        let mut record = SessionRecord::new("u1");
        record.profile.age = Some(52);

        let reply = desk
            .handle(
                "I have severe chest pain",
                &record,
                Urgency::High,
                "crisis_signal",
            )
            .await
            .unwrap();

        assert!(reply.text.contains("emergency"));
        assert_eq!(reply.payload["urgency"], "high");
        let ChangeOp::SetEscalation(state) = &reply.changes.ops[0] else {
            panic!("expected an escalation change");
        };
        assert_eq!(state.status, EscalationPhase::PendingReview);
    }

    #[tokio::test]
    async fn test_summary_carries_profile_context() {
        let desk = EscalationDesk;
        let mut record = SessionRecord::new("u1");
        record.profile.medical_conditions.push("heart_disease".to_string());

        let reply = desk
            .handle("help", &record, Urgency::Medium, "high_risk_condition")
            .await
            .unwrap();
        assert_eq!(
            reply.payload["profile"]["medical_conditions"][0],
            "heart_disease"
        );
    }
}
