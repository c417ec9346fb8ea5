//! Check-in scheduling tool: proposes recurring accountability dates.
//!
//! Scheduling is advisory. The tool emits proposed dates in its payload
//! and leaves the session record untouched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;

use crate::adapters::CompletionService;
use crate::core::guardrails::GuardrailEngine;
use crate::domain::{ChangeSet, SessionRecord};

use super::{Tool, ToolError, ToolKind, ToolOutput, ToolParams};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Days between check-ins by requested cadence
fn interval_days(frequency: &str) -> i64 {
    match frequency {
        "daily" => 1,
        "biweekly" => 14,
        _ => 7,
    }
}

pub struct CheckinScheduler {
    completion: Arc<dyn CompletionService>,
}

impl CheckinScheduler {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    fn schedule(record: &SessionRecord, frequency: &str) -> Vec<DateTime<Utc>> {
        let step_days = interval_days(frequency);
        let step = ChronoDuration::days(step_days);
        let now = Utc::now();
        // Dates tick from the goal's start until the goal window ends,
        // or four weeks from today when no goal is set
        let (anchor, horizon) = match record.active_goal() {
            Some(goal) => (
                goal.created_at,
                goal.created_at + ChronoDuration::weeks(goal.timeframe_weeks as i64),
            ),
            None => (now, now + ChronoDuration::weeks(4)),
        };

        // First tick strictly after today
        let mut next = anchor + step;
        if now > anchor {
            let elapsed_steps = (now - anchor).num_days() / step_days;
            next = anchor + ChronoDuration::days(step_days * (elapsed_steps + 1));
        }

        let mut dates = Vec::new();
        while next <= horizon && dates.len() < 60 {
            dates.push(next);
            next += step;
        }
        dates
    }
}

#[async_trait]
impl Tool for CheckinScheduler {
    fn kind(&self) -> ToolKind {
        ToolKind::CheckinScheduler
    }

    fn validate_input(&self, params: &ToolParams) -> Result<(), ToolError> {
        if let Some(frequency) = params.field("frequency") {
            if !["daily", "weekly", "biweekly"].contains(&frequency) {
                return Err(ToolError::InvalidInput(format!(
                    "frequency must be daily, weekly, or biweekly (got {})",
                    frequency
                )));
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
        let frequency = params.field("frequency").unwrap_or("weekly");
        let dates = Self::schedule(record, frequency);

        let prompt = format!(
            "One sentence on why {} check-ins help with accountability.",
            frequency
        );
        let rationale = self.completion.complete(&prompt, COMPLETION_TIMEOUT).await?;

        let payload = json!({
            "frequency": frequency,
            "checkin_dates": dates
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>(),
        });

        let text = match dates.first() {
            Some(first) => format!(
                "I've sketched {} {} check-ins, starting {}. {}",
                dates.len(),
                frequency,
                first.format("%Y-%m-%d"),
                rationale
            ),
            None => format!(
                "Your goal window has already closed, so there's nothing left to schedule. {}",
                rationale
            ),
        };

        Ok(ToolOutput {
            text,
            payload,
            changes: ChangeSet::new(),
        })
    }

    fn post_execute(&self, mut output: ToolOutput) -> ToolOutput {
        output.text = output.text.trim().to_string();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CannedCompletion;
    use crate::domain::{ChangeOp, Goal};
    use std::collections::HashMap;

    fn scheduler() -> CheckinScheduler {
        CheckinScheduler::new(Arc::new(CannedCompletion))
    }

    #[test]
    fn test_validate_rejects_unknown_frequency() {
        let scheduler = scheduler();
        let mut fields = HashMap::new();
        fields.insert("frequency".to_string(), "hourly".to_string());
        assert!(scheduler
            .validate_input(&ToolParams::new("check in hourly", fields))
            .is_err());
    }

    #[tokio::test]
    async fn test_weekly_schedule_tracks_goal_window() {
        let scheduler = scheduler();
        let mut record = SessionRecord::new("u1");
        let goal = Goal::new("weight_loss", "lose 4 kg over 8 weeks", 4.0, 8);
        record
            .apply(&ChangeSet::single(ChangeOp::AddGoal(goal)))
            .unwrap();

        let output = scheduler
            .execute(&ToolParams::new("schedule check-ins", HashMap::new()), &record)
            .await
            .unwrap();

        let dates = output.payload["checkin_dates"].as_array().unwrap();
        assert_eq!(dates.len(), 8);
        // Scheduling never mutates the record
        assert!(output.changes.is_empty());
    }

    #[tokio::test]
    async fn test_elapsed_goal_weeks_are_skipped() {
        let scheduler = scheduler();
        let mut record = SessionRecord::new("u1");
        let mut goal = Goal::new("weight_loss", "lose 4 kg over 8 weeks", 4.0, 8);
        goal.created_at = Utc::now() - ChronoDuration::weeks(3);
        record
            .apply(&ChangeSet::single(ChangeOp::AddGoal(goal)))
            .unwrap();

        let output = scheduler
            .execute(&ToolParams::new("schedule check-ins", HashMap::new()), &record)
            .await
            .unwrap();

        // Weeks 4 through 8 of the window remain
        let dates = output.payload["checkin_dates"].as_array().unwrap();
        assert_eq!(dates.len(), 5);
    }

    #[tokio::test]
    async fn test_no_goal_defaults_to_four_weeks() {
        let scheduler = scheduler();
        let record = SessionRecord::new("u1");

        let output = scheduler
            .execute(&ToolParams::new("schedule check-ins", HashMap::new()), &record)
            .await
            .unwrap();

        let dates = output.payload["checkin_dates"].as_array().unwrap();
        assert_eq!(dates.len(), 4);
    }
}
