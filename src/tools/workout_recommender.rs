//! Workout recommendation tool: schedule, exercises, and progression.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::adapters::CompletionService;
use crate::core::guardrails::GuardrailEngine;
use crate::domain::{ChangeOp, ChangeSet, SessionRecord, WorkoutDay, WorkoutPlan};

use super::{Tool, ToolError, ToolKind, ToolOutput, ToolParams};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Fraction of maximum heart rate targeted per experience level
fn intensity_fraction(level: &str) -> f64 {
    match level {
        "beginner" => 0.60,
        "intermediate" => 0.70,
        "advanced" => 0.78,
        _ => 0.60,
    }
}

fn training_days(level: &str) -> &'static [(&'static str, &'static str, u32)] {
    match level {
        "beginner" => &[
            ("monday", "full body", 30),
            ("wednesday", "cardio", 25),
            ("friday", "full body", 30),
        ],
        "intermediate" => &[
            ("monday", "upper body", 45),
            ("tuesday", "cardio", 30),
            ("thursday", "lower body", 45),
            ("saturday", "full body", 40),
        ],
        _ => &[
            ("monday", "push", 60),
            ("tuesday", "pull", 60),
            ("wednesday", "cardio", 40),
            ("thursday", "legs", 60),
            ("saturday", "full body", 50),
        ],
    }
}

fn exercises_for(focus: &str, equipment: &str) -> Vec<String> {
    let gym = equipment.contains("gym") || equipment.contains("barbell");
    let pool: &[&str] = match (focus, gym) {
        ("full body", true) => &["squat", "bench press", "seated row", "plank"],
        ("full body", false) => &["bodyweight squat", "push-up", "inverted row", "plank"],
        ("upper body" | "push", true) => &["bench press", "overhead press", "dips"],
        ("upper body" | "push", false) => &["push-up", "pike push-up", "dips on chair"],
        ("pull", true) => &["lat pulldown", "barbell row", "face pull"],
        ("pull", false) => &["doorframe row", "towel row", "superman hold"],
        ("lower body" | "legs", true) => &["squat", "leg press", "calf raise"],
        ("lower body" | "legs", false) => &["bodyweight squat", "lunge", "glute bridge"],
        _ => &["brisk walk", "cycling", "rowing"],
    };
    pool.iter().map(|s| s.to_string()).collect()
}

/// Generates personalized workout plans by fitness level and equipment
pub struct WorkoutRecommender {
    completion: Arc<dyn CompletionService>,
}

impl WorkoutRecommender {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl Tool for WorkoutRecommender {
    fn kind(&self) -> ToolKind {
        ToolKind::WorkoutRecommender
    }

    fn validate_input(&self, params: &ToolParams) -> Result<(), ToolError> {
        let level = params
            .field("fitness_level")
            .ok_or_else(|| ToolError::InvalidInput("missing fitness_level".to_string()))?;
        if !["beginner", "intermediate", "advanced"].contains(&level) {
            return Err(ToolError::InvalidInput(format!(
                "fitness_level must be beginner, intermediate, or advanced (got {})",
                level
            )));
        }
        if params.field("equipment_access").is_none() {
            return Err(ToolError::InvalidInput("missing equipment_access".to_string()));
        }
        if params.field("time_availability").is_none() {
            return Err(ToolError::InvalidInput("missing time_availability".to_string()));
        }
        Ok(())
    }

    async fn pre_execute(
        &self,
        mut params: ToolParams,
        record: &SessionRecord,
        guardrails: &GuardrailEngine,
    ) -> Result<ToolParams, ToolError> {
        guardrails
            .check_medical_clearance(record)
            .map_err(ToolError::Rejected)?;

        let age = record.profile.age.unwrap_or(30);
        let level = params.field("fitness_level").unwrap_or("beginner");
        let max_heart_rate = (220 - age.min(219)) as f64;
        let intensity = intensity_fraction(level) * max_heart_rate;

        params
            .fields
            .insert("intensity_bpm".to_string(), format!("{:.0}", intensity));
        Ok(params)
    }

    async fn execute(
        &self,
        params: &ToolParams,
        record: &SessionRecord,
    ) -> Result<ToolOutput, ToolError> {
        let level = params.field("fitness_level").unwrap_or("beginner");
        let equipment = params.field("equipment_access").unwrap_or("none");
        let intensity = params.numeric_field("intensity_bpm").unwrap_or(120.0);

        let weekly_schedule: Vec<WorkoutDay> = training_days(level)
            .iter()
            .map(|(day, focus, minutes)| WorkoutDay {
                day: day.to_string(),
                focus: focus.to_string(),
                duration_minutes: *minutes,
                exercises: exercises_for(focus, equipment),
            })
            .collect();

        let mut progression_plan = HashMap::new();
        for day in &weekly_schedule {
            for exercise in &day.exercises {
                progression_plan
                    .entry(exercise.clone())
                    .or_insert_with(|| "add one rep per set each week".to_string());
            }
        }

        let prompt = format!(
            "One sentence of form advice for a {} training plan at {:.0} bpm target.",
            level, intensity
        );
        let advice = self.completion.complete(&prompt, COMPLETION_TIMEOUT).await?;

        let plan = WorkoutPlan {
            id: Uuid::new_v4(),
            goal_id: record.active_goal().map(|g| g.id),
            weekly_schedule,
            progression_plan,
            intensity,
            created_at: Utc::now(),
            superseded_at: None,
        };

        let payload = json!({
            "plan_id": plan.id,
            "days_per_week": plan.weekly_schedule.len(),
            "target_heart_rate": plan.intensity,
        });

        let text = format!(
            "Here's a {} plan: {} sessions a week at a target of {:.0} bpm. {}",
            level,
            plan.weekly_schedule.len(),
            intensity,
            advice
        );

        Ok(ToolOutput {
            text,
            payload,
            changes: ChangeSet::single(ChangeOp::SetWorkoutPlan(plan)),
        })
    }

    fn post_execute(&self, mut output: ToolOutput) -> ToolOutput {
        output.text = output.text.trim().to_string();
        output
    }
}
