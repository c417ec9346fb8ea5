//! Progress logging tool: records check-ins and summarizes the trend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::adapters::CompletionService;
use crate::core::guardrails::GuardrailEngine;
use crate::domain::{ChangeOp, ChangeSet, ProgressEntry, SessionRecord};

use super::{Tool, ToolError, ToolKind, ToolOutput, ToolParams};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Logs progress entries and reports trend against the active goal
pub struct ProgressTracker {
    completion: Arc<dyn CompletionService>,
}

impl ProgressTracker {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    fn trend(record: &SessionRecord, new_weight: Option<f64>) -> Option<f64> {
        let weight = new_weight?;
        let previous = record
            .progress_history
            .iter()
            .rev()
            .find_map(|e| e.weight_kg)?;
        Some(weight - previous)
    }
}

#[async_trait]
impl Tool for ProgressTracker {
    fn kind(&self) -> ToolKind {
        ToolKind::ProgressTracker
    }

    fn validate_input(&self, params: &ToolParams) -> Result<(), ToolError> {
        if let Some(raw) = params.field("weight") {
            let weight: f64 = raw
                .parse()
                .map_err(|_| ToolError::InvalidInput(format!("weight is not a number: {}", raw)))?;
            if !(20.0..=400.0).contains(&weight) {
                return Err(ToolError::InvalidInput(format!(
                    "weight out of plausible range: {}",
                    weight
                )));
            }
        } else if params.field("energy_level").is_none() && params.field("notes").is_none() {
            return Err(ToolError::InvalidInput(
                "a progress update needs a weight, an energy level, or notes".to_string(),
            ));
        }
        if let Some(raw) = params.field("energy_level") {
            let level: u8 = raw.parse().map_err(|_| {
                ToolError::InvalidInput(format!("energy_level is not a number: {}", raw))
            })?;
            if !(1..=10).contains(&level) {
                return Err(ToolError::InvalidInput(
                    "energy_level must be between 1 and 10".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn pre_execute(
        &self,
        params: ToolParams,
        _record: &SessionRecord,
        _guardrails: &GuardrailEngine,
    ) -> Result<ToolParams, ToolError> {
        Ok(params)
    }

    async fn execute(
        &self,
        params: &ToolParams,
        record: &SessionRecord,
    ) -> Result<ToolOutput, ToolError> {
        let weight = params.numeric_field("weight");
        let energy = params
            .field("energy_level")
            .and_then(|v| v.parse::<u8>().ok());
        let notes = params.field("notes").map(|s| s.to_string());

        let delta = Self::trend(record, weight);
        let trend_text = match delta {
            Some(d) if d < -0.05 => format!("down {:.1} kg since your last check-in", -d),
            Some(d) if d > 0.05 => format!("up {:.1} kg since your last check-in", d),
            Some(_) => "holding steady since your last check-in".to_string(),
            None => "your first logged check-in".to_string(),
        };

        let prompt = format!(
            "One sentence of encouragement for someone {} toward their goal.",
            trend_text
        );
        let encouragement = self.completion.complete(&prompt, COMPLETION_TIMEOUT).await?;

        let entry = ProgressEntry {
            date: Utc::now(),
            weight_kg: weight,
            measurements: Default::default(),
            energy_level: energy,
            workout_compliance: None,
            diet_compliance: None,
            notes,
        };

        let payload = json!({
            "weight_kg": weight,
            "delta_kg": delta,
            "entries_logged": record.progress_history.len() + 1,
        });

        let text = match weight {
            Some(w) => format!("Logged {:.1} kg, {}. {}", w, trend_text, encouragement),
            None => format!("Check-in logged, {}. {}", trend_text, encouragement),
        };

        Ok(ToolOutput {
            text,
            payload,
            changes: ChangeSet::single(ChangeOp::AddProgress(entry)),
        })
    }

    fn post_execute(&self, mut output: ToolOutput) -> ToolOutput {
        output.text = output.text.trim().to_string();
        output
    }
}
