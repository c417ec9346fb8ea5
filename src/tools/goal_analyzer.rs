//! Goal analysis tool: turns a stated ambition into a structured goal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::adapters::CompletionService;
use crate::core::guardrails::GuardrailEngine;
use crate::domain::{ChangeOp, ChangeSet, Goal, SessionRecord};

use super::{Tool, ToolError, ToolKind, ToolOutput, ToolParams};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Ten years; anything longer is taken as a misparse, not a plan
const MAX_TIMEFRAME_WEEKS: f64 = 520.0;

/// Analyzes goal statements and proposes a structured, safety-checked goal
pub struct GoalAnalyzer {
    completion: Arc<dyn CompletionService>,
}

impl GoalAnalyzer {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    fn infer_goal_type(text: &str) -> &'static str {
        let lowered = text.to_lowercase();
        if lowered.contains("lose") || lowered.contains("drop") || lowered.contains("shed") {
            "weight_loss"
        } else if lowered.contains("gain") || lowered.contains("build") || lowered.contains("muscle")
        {
            "muscle_gain"
        } else {
            "general_fitness"
        }
    }

    /// Supporting numbers for the goal type, mirroring standard coaching
    /// heuristics
    fn goal_metrics(goal_type: &str) -> Vec<(&'static str, f64)> {
        match goal_type {
            "weight_loss" => vec![("daily_calorie_deficit", 500.0), ("weekly_weight_loss", 0.5)],
            "muscle_gain" => vec![("daily_calorie_surplus", 300.0), ("weekly_weight_gain", 0.25)],
            _ => vec![("weekly_sessions", 3.0)],
        }
    }
}

#[async_trait]
impl Tool for GoalAnalyzer {
    fn kind(&self) -> ToolKind {
        ToolKind::GoalAnalyzer
    }

    fn validate_input(&self, params: &ToolParams) -> Result<(), ToolError> {
        let target = params
            .numeric_field("target")
            .ok_or_else(|| ToolError::InvalidInput("missing numeric target".to_string()))?;
        if target <= 0.0 {
            return Err(ToolError::InvalidInput(
                "target must be positive".to_string(),
            ));
        }

        let timeframe = params
            .numeric_field("timeframe")
            .ok_or_else(|| ToolError::InvalidInput("missing timeframe in weeks".to_string()))?;
        if timeframe < 1.0 {
            return Err(ToolError::InvalidInput(
                "timeframe must be at least one week".to_string(),
            ));
        }
        if timeframe > MAX_TIMEFRAME_WEEKS {
            return Err(ToolError::InvalidInput(format!(
                "timeframe must be {} weeks or less",
                MAX_TIMEFRAME_WEEKS
            )));
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
            .check_goal_text(&params.text)
            .map_err(ToolError::Rejected)?;

        let target = params.numeric_field("target").unwrap_or(0.0);
        let weeks = params.numeric_field("timeframe").unwrap_or(0.0) as u32;
        guardrails
            .check_progression_rate(target, weeks.saturating_mul(7))
            .map_err(ToolError::Rejected)?;

        params
            .fields
            .insert("goal_type".to_string(), Self::infer_goal_type(&params.text).to_string());

        // Current status comes from the profile when the user didn't state it
        if !params.fields.contains_key("current_status") {
            if let Some(weight) = record.profile.weight_kg {
                params
                    .fields
                    .insert("current_status".to_string(), format!("{:.1}", weight));
            }
        }

        Ok(params)
    }

    async fn execute(
        &self,
        params: &ToolParams,
        _record: &SessionRecord,
    ) -> Result<ToolOutput, ToolError> {
        let goal_type = params.field("goal_type").unwrap_or("general_fitness");
        let target = params.numeric_field("target").unwrap_or(0.0);
        let weeks = params.numeric_field("timeframe").unwrap_or(1.0) as u32;

        let prompt = format!(
            "Write one encouraging sentence for a {} goal of {} units over {} weeks.",
            goal_type, target, weeks
        );
        let narrative = self
            .completion
            .complete(&prompt, COMPLETION_TIMEOUT)
            .await?;

        let mut goal = Goal::new(goal_type, params.text.clone(), target, weeks);
        for (name, value) in Self::goal_metrics(goal_type) {
            goal.metrics.insert(name.to_string(), value);
        }

        let payload = json!({
            "goal_id": goal.id,
            "goal_type": goal.goal_type,
            "target_value": goal.target_value,
            "timeframe_weeks": goal.timeframe_weeks,
            "weekly_rate": goal.weekly_rate(),
            "metrics": goal.metrics,
        });

        let text = format!(
            "Goal set: {} of {} over {} weeks ({:.2} per week). {}",
            goal_type.replace('_', " "),
            target,
            weeks,
            goal.weekly_rate(),
            narrative
        );

        Ok(ToolOutput {
            text,
            payload,
            changes: ChangeSet::single(ChangeOp::AddGoal(goal)),
        })
    }

    fn post_execute(&self, mut output: ToolOutput) -> ToolOutput {
        output.text = output.text.trim().to_string();
        output
    }
}
