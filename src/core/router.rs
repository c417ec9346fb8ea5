//! Turn routing: maps a classified intent onto a tool, a specialist
//! handoff, or a clarification request.
//!
//! Routing priority is fixed. Crisis language always wins, repeated
//! failed clarifications and high-risk medical profiles escalate next,
//! then injury and complex-nutrition signals pick specialists, and only
//! then does the topic map to a tool.

use crate::adapters::{Intent, Signal};
use crate::capabilities::CapabilityKind;
use crate::config::RoutingPolicy;
use crate::domain::{SessionRecord, Topic, Urgency};
use crate::tools::ToolKind;

/// Where a turn goes next
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    /// Run a tool through the four-phase contract
    Tool(ToolKind),

    /// Hand the session to a specialist capability
    Handoff {
        target: CapabilityKind,
        reason: String,
        urgency: Urgency,
    },

    /// Not enough to act on; ask follow-up questions
    Clarify,
}

pub struct Router {
    policy: RoutingPolicy,
    high_risk_conditions: Vec<String>,
}

impl Router {
    pub fn new(policy: RoutingPolicy, high_risk_conditions: Vec<String>) -> Self {
        Self {
            policy,
            high_risk_conditions,
        }
    }

    pub fn route(&self, intent: &Intent, record: &SessionRecord) -> RoutingDecision {
        if let Some(Signal::Crisis(phrase)) = intent
            .signals
            .iter()
            .find(|s| matches!(s, Signal::Crisis(_)))
        {
            return RoutingDecision::Handoff {
                target: CapabilityKind::Escalation,
                reason: format!("crisis language: {}", phrase),
                urgency: Urgency::High,
            };
        }

        if record.conversation.failed_clarifications >= self.policy.max_failed_clarifications {
            return RoutingDecision::Handoff {
                target: CapabilityKind::Escalation,
                reason: "repeated clarification failures".to_string(),
                urgency: Urgency::Low,
            };
        }

        if let Some(condition) = self.high_risk_condition(record) {
            if matches!(
                intent.topic,
                Some(Topic::WorkoutPlanning) | Some(Topic::GoalSetting)
            ) {
                return RoutingDecision::Handoff {
                    target: CapabilityKind::Escalation,
                    reason: format!("high-risk condition on file: {}", condition),
                    urgency: Urgency::Medium,
                };
            }
        }

        if let Some(Signal::Injury(phrase)) = intent
            .signals
            .iter()
            .find(|s| matches!(s, Signal::Injury(_)))
        {
            return RoutingDecision::Handoff {
                target: CapabilityKind::InjurySupport,
                reason: format!("injury mention: {}", phrase),
                urgency: Urgency::Medium,
            };
        }

        let complex_nutrition = intent
            .signals
            .iter()
            .any(|s| matches!(s, Signal::ComplexNutrition(_)))
            || (intent.topic == Some(Topic::DietPlanning)
                && !record.profile.medical_conditions.is_empty());
        if complex_nutrition {
            return RoutingDecision::Handoff {
                target: CapabilityKind::NutritionExpert,
                reason: "nutrition question with medical context".to_string(),
                urgency: Urgency::Medium,
            };
        }

        match intent.topic {
            Some(Topic::GoalSetting) => RoutingDecision::Tool(ToolKind::GoalAnalyzer),
            Some(Topic::DietPlanning) => RoutingDecision::Tool(ToolKind::MealPlanner),
            Some(Topic::WorkoutPlanning) => RoutingDecision::Tool(ToolKind::WorkoutRecommender),
            Some(Topic::ProgressUpdate) => RoutingDecision::Tool(ToolKind::ProgressTracker),
            Some(Topic::CheckinScheduling) => RoutingDecision::Tool(ToolKind::CheckinScheduler),
            Some(Topic::General) | None => RoutingDecision::Clarify,
        }
    }

    fn high_risk_condition<'a>(&'a self, record: &'a SessionRecord) -> Option<&'a str> {
        record
            .profile
            .medical_conditions
            .iter()
            .find(|c| self.high_risk_conditions.iter().any(|h| h == *c))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardrailPolicy;
    use std::collections::HashMap;

    fn intent(topic: Option<Topic>, signals: Vec<Signal>) -> Intent {
        Intent {
            topic,
            fields: HashMap::new(),
            signals,
        }
    }

    fn router() -> Router {
        Router::new(
            RoutingPolicy::default(),
            GuardrailPolicy::default().high_risk_conditions,
        )
    }

    #[test]
    fn test_topics_map_to_tools() {
        let router = router();
        let record = SessionRecord::new("u1");
        assert_eq!(
            router.route(&intent(Some(Topic::GoalSetting), vec![]), &record),
            RoutingDecision::Tool(ToolKind::GoalAnalyzer)
        );
        assert_eq!(
            router.route(&intent(Some(Topic::ProgressUpdate), vec![]), &record),
            RoutingDecision::Tool(ToolKind::ProgressTracker)
        );
        assert_eq!(
            router.route(&intent(None, vec![]), &record),
            RoutingDecision::Clarify
        );
    }

    #[test]
    fn test_crisis_beats_everything() {
        let router = router();
        let mut record = SessionRecord::new("u1");
        record.profile.medical_conditions.push("heart_disease".to_string());

        let decision = router.route(
            &intent(
                Some(Topic::WorkoutPlanning),
                vec![
                    Signal::Injury("knee".to_string()),
                    Signal::Crisis("chest pain".to_string()),
                ],
            ),
            &record,
        );
        match decision {
            RoutingDecision::Handoff {
                target, urgency, ..
            } => {
                assert_eq!(target, CapabilityKind::Escalation);
                assert_eq!(urgency, Urgency::High);
            }
            other => panic!("expected escalation, got {:?}", other),
        }
    }

    #[test]
    fn test_high_risk_profile_escalates_training_topics() {
        let router = router();
        let mut record = SessionRecord::new("u1");
        record.profile.medical_conditions.push("recent_surgery".to_string());

        let decision = router.route(&intent(Some(Topic::WorkoutPlanning), vec![]), &record);
        assert!(matches!(
            decision,
            RoutingDecision::Handoff {
                target: CapabilityKind::Escalation,
                urgency: Urgency::Medium,
                ..
            }
        ));

        // Progress updates stay with the tool even for high-risk profiles
        let decision = router.route(&intent(Some(Topic::ProgressUpdate), vec![]), &record);
        assert_eq!(decision, RoutingDecision::Tool(ToolKind::ProgressTracker));
    }

    #[test]
    fn test_exhausted_clarifications_escalate_low() {
        let router = router();
        let mut record = SessionRecord::new("u1");
        record.conversation.failed_clarifications = 3;

        let decision = router.route(&intent(None, vec![]), &record);
        assert!(matches!(
            decision,
            RoutingDecision::Handoff {
                urgency: Urgency::Low,
                ..
            }
        ));
    }

    #[test]
    fn test_diet_with_medical_history_goes_to_nutrition_expert() {
        let router = router();
        let mut record = SessionRecord::new("u1");
        record.profile.medical_conditions.push("celiac".to_string());

        let decision = router.route(&intent(Some(Topic::DietPlanning), vec![]), &record);
        assert!(matches!(
            decision,
            RoutingDecision::Handoff {
                target: CapabilityKind::NutritionExpert,
                ..
            }
        ));
    }
}
