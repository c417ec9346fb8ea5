//! Injury-aware training adjustment.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{ChangeOp, ChangeSet, SessionRecord, Urgency, WorkoutPlan};

use super::{Capability, CapabilityError, CapabilityKind, CapabilityReply};

/// Factor applied to a current plan's intensity while an injury heals
const RECOVERY_INTENSITY_FACTOR: f64 = 0.6;

fn affected_area(query: &str) -> Option<&'static str> {
    let lowered = query.to_lowercase();
    for area in ["knee", "ankle", "shoulder", "back", "wrist", "hip", "elbow"] {
        if lowered.contains(area) {
            return Some(area);
        }
    }
    None
}

fn avoid_for(area: Option<&str>) -> Vec<&'static str> {
    match area {
        Some("knee") | Some("ankle") | Some("hip") => {
            vec!["jumping", "running", "heavy squats", "lunges"]
        }
        Some("shoulder") | Some("wrist") | Some("elbow") => {
            vec!["overhead pressing", "push-ups", "dips"]
        }
        Some("back") => vec!["deadlifts", "heavy squats", "twisting under load"],
        _ => vec!["anything that reproduces the pain"],
    }
}

/// Dials back the current workout plan and swaps in recovery guidance
pub struct InjurySupport;

#[async_trait]
impl Capability for InjurySupport {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::InjurySupport
    }

    async fn handle(
        &self,
        query: &str,
        record: &SessionRecord,
        _urgency: Urgency,
        _reason: &str,
    ) -> Result<CapabilityReply, CapabilityError> {
        let area = affected_area(query);
        let avoid = avoid_for(area);

        let mut changes = ChangeSet::new();
        let mut adjusted = false;
        if let Some(current) = record.current_workout_plan() {
            let mut reduced = WorkoutPlan {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                superseded_at: None,
                intensity: current.intensity * RECOVERY_INTENSITY_FACTOR,
                ..current.clone()
            };
            for day in &mut reduced.weekly_schedule {
                day.exercises
                    .retain(|e| !avoid.iter().any(|a| e.contains(a.trim_end_matches('s'))));
            }
            reduced
                .progression_plan
                .insert("recovery".to_string(), "hold intensity until pain-free for a week".to_string());
            changes.push(ChangeOp::SetWorkoutPlan(reduced));
            adjusted = true;
        }

        let area_text = area.map(|a| format!("your {}", a)).unwrap_or_else(|| "the injured area".to_string());
        let mut text = format!(
            "Sorry to hear about {}. Rest it, and avoid {} until the pain settles. \
             If it's severe, swelling, or not improving within a few days, see a clinician.",
            area_text,
            avoid.join(", ")
        );
        if adjusted {
            text.push_str(" I've dialed your training plan down to recovery intensity in the meantime.");
        }

        Ok(CapabilityReply {
            text,
            payload: json!({
                "affected_area": area,
                "avoid": avoid,
                "plan_adjusted": adjusted,
            }),
            changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkoutDay;

    fn plan(intensity: f64) -> WorkoutPlan {
        WorkoutPlan {
            id: Uuid::new_v4(),
            goal_id: None,
            weekly_schedule: vec![WorkoutDay {
                day: "monday".to_string(),
                focus: "legs".to_string(),
                duration_minutes: 45,
                exercises: vec!["heavy squat".to_string(), "calf raise".to_string()],
            }],
            progression_plan: Default::default(),
            intensity,
            created_at: Utc::now(),
            superseded_at: None,
        }
    }

    #[tokio::test]
    async fn test_reduces_current_plan_intensity() {
        let support = InjurySupport;
        let mut record = SessionRecord::new("u1");
        record
            .apply(&ChangeSet::single(ChangeOp::SetWorkoutPlan(plan(150.0))))
            .unwrap();

        let reply = support
            .handle("my knee hurts after squats", &record, Urgency::Medium, "injury_signal")
            .await
            .unwrap();

        let ChangeOp::SetWorkoutPlan(reduced) = &reply.changes.ops[0] else {
            panic!("expected a plan change");
        };
        assert!((reduced.intensity - 90.0).abs() < 1e-9);
        assert!(reduced.weekly_schedule[0]
            .exercises
            .iter()
            .all(|e| !e.contains("squat")));
        assert_eq!(reply.payload["affected_area"], "knee");
    }

    #[tokio::test]
    async fn test_no_plan_gives_advice_only() {
        let support = InjurySupport;
        let record = SessionRecord::new("u1");
        let reply = support
            .handle("I tweaked my shoulder", &record, Urgency::Medium, "injury_signal")
            .await
            .unwrap();
        assert!(reply.changes.is_empty());
        assert_eq!(reply.payload["plan_adjusted"], false);
    }
}
