//! Complex nutrition guidance for users with medical context.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{ChangeOp, ChangeSet, SessionRecord, Urgency};

use super::{Capability, CapabilityError, CapabilityKind, CapabilityReply};

fn guidance_for(condition: &str) -> Option<&'static str> {
    match condition {
        "uncontrolled_diabetes" | "diabetes" => Some(
            "keep carbohydrate intake consistent across meals and favor low-glycemic sources",
        ),
        "heart_disease" | "severe_hypertension" | "hypertension" => Some(
            "keep sodium under 2300 mg a day and lean on vegetables, whole grains, and fish",
        ),
        "celiac" | "celiac_disease" => Some("all grains need to be certified gluten-free"),
        "kidney_disease" => Some("protein and potassium targets need clinical input"),
        _ => None,
    }
}

/// Handles diet questions that cross into medical territory
pub struct NutritionExpert;

#[async_trait]
impl Capability for NutritionExpert {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::NutritionExpert
    }

    async fn handle(
        &self,
        query: &str,
        record: &SessionRecord,
        _urgency: Urgency,
        _reason: &str,
    ) -> Result<CapabilityReply, CapabilityError> {
        let conditions = &record.profile.medical_conditions;
        let notes: Vec<&str> = conditions
            .iter()
            .filter_map(|c| guidance_for(c))
            .collect();

        // Fold any restrictions mentioned in the query into the profile
        let lowered = query.to_lowercase();
        let mut preferences = record.profile.dietary_preferences.clone();
        for term in ["vegetarian", "vegan", "gluten-free", "dairy-free", "halal", "kosher"] {
            if lowered.contains(term) && !preferences.iter().any(|p| p == term) {
                preferences.push(term.to_string());
            }
        }
        let mut changes = ChangeSet::new();
        if preferences != record.profile.dietary_preferences {
            changes.push(ChangeOp::SetDietaryPreferences(preferences.clone()));
        }

        let mut text = String::new();
        if notes.is_empty() {
            text.push_str(
                "Happy to dig into the details of your diet. Tell me what a typical day of eating looks like and we'll adjust from there.",
            );
        } else {
            text.push_str("With your health history in mind: ");
            text.push_str(&notes.join("; "));
            text.push('.');
        }
        text.push_str(
            " This is general guidance, not medical advice. Please confirm any changes with your doctor or a registered dietitian.",
        );

        Ok(CapabilityReply {
            text,
            payload: json!({
                "conditions_considered": conditions,
                "dietary_preferences": preferences,
                "clinical_referral_suggested": !notes.is_empty(),
            }),
            changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_condition_specific_guidance_with_disclaimer() {
        let expert = NutritionExpert;
        let mut record = SessionRecord::new("u1");
        record.profile.medical_conditions.push("diabetes".to_string());

        let reply = expert
            .handle("what should I eat?", &record, Urgency::Medium, "complex_nutrition")
            .await
            .unwrap();
        assert!(reply.text.contains("low-glycemic"));
        assert!(reply.text.contains("not medical advice"));
        assert_eq!(reply.payload["clinical_referral_suggested"], true);
    }

    #[tokio::test]
    async fn test_new_restriction_recorded_once() {
        let expert = NutritionExpert;
        let mut record = SessionRecord::new("u1");
        record.profile.dietary_preferences.push("vegetarian".to_string());

        let reply = expert
            .handle(
                "I'm vegetarian and thinking of going gluten-free",
                &record,
                Urgency::Medium,
                "complex_nutrition",
            )
            .await
            .unwrap();

        let ChangeOp::SetDietaryPreferences(prefs) = &reply.changes.ops[0] else {
            panic!("expected a preferences change");
        };
        assert_eq!(prefs.iter().filter(|p| *p == "vegetarian").count(), 1);
        assert!(prefs.iter().any(|p| p == "gluten-free"));
    }
}
