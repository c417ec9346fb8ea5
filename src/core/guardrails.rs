//! Guardrail enforcement gating session-record mutation.
//!
//! The engine is a pure function of a proposed change set and the current
//! record: no I/O, no side effects. A single failing rule rejects the whole
//! set; the coordinator never applies any part of a rejected change.

use thiserror::Error;

use crate::config::GuardrailPolicy;
use crate::domain::{ChangeOp, ChangeSet, Goal, SessionRecord, WorkoutPlan};

/// Age assumed for intensity checks when the profile has none
const FALLBACK_AGE: u32 = 30;

/// Result of a guardrail check
#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailOutcome {
    Accept,
    Reject(RejectReason),
}

impl GuardrailOutcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, GuardrailOutcome::Accept)
    }
}

/// Why a proposed change was rejected.
///
/// Every variant has a stable machine-readable code used in logs and tests;
/// `Display` gives the user-facing explanation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("That goal is too vague for me to work with. Could you describe it in a little more detail?")]
    GoalTooVague,

    #[error("Goals promoting rapid changes aren't safe, so I can't set that up. A steadier pace gets better results; want to try a longer timeframe?")]
    UnsafePaceRequest,

    #[error("A change of {weekly_rate:.1} per week is above the safe limit of {limit:.1} per week. Let's pick a gentler target or a longer timeframe.")]
    UnsafeProgressionRate { weekly_rate: f64, limit: f64 },

    #[error("A target heart rate of {intensity:.0} bpm is above the safe ceiling of {limit:.0} bpm for your age, so I can't recommend that plan.")]
    IntensityUnsafeForAge { intensity: f64, limit: f64 },

    #[error("Because of {condition} on your profile, please get medical clearance before we intensify your plan.")]
    MedicalClearanceRequired { condition: String },

    #[error("Raising intensity from {previous:.0} to {proposed:.0} is more than a 10% step; progressions that aggressive risk injury.")]
    ProgressionTooAggressive { previous: f64, proposed: f64 },
}

impl RejectReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::GoalTooVague => "goal_too_vague",
            RejectReason::UnsafePaceRequest => "unsafe_pace_request",
            RejectReason::UnsafeProgressionRate { .. } => "unsafe_progression_rate",
            RejectReason::IntensityUnsafeForAge { .. } => "intensity_unsafe_for_age",
            RejectReason::MedicalClearanceRequired { .. } => "medical_clearance_required",
            RejectReason::ProgressionTooAggressive { .. } => "progression_too_aggressive",
        }
    }
}

/// Pure policy checks over proposed session-record changes
#[derive(Debug, Clone, Default)]
pub struct GuardrailEngine {
    policy: GuardrailPolicy,
}

impl GuardrailEngine {
    pub fn new(policy: GuardrailPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GuardrailPolicy {
        &self.policy
    }

    /// Check a full change set against the current record.
    ///
    /// All-or-nothing: the first failing op rejects the whole set.
    pub fn check(&self, changes: &ChangeSet, record: &SessionRecord) -> GuardrailOutcome {
        for op in &changes.ops {
            if let Err(reason) = self.check_op(op, record) {
                return GuardrailOutcome::Reject(reason);
            }
        }
        GuardrailOutcome::Accept
    }

    fn check_op(&self, op: &ChangeOp, record: &SessionRecord) -> Result<(), RejectReason> {
        match op {
            ChangeOp::AddGoal(goal) => {
                self.check_goal_text(&goal.description)?;
                self.check_progression_rate(goal.target_value, goal.timeframe_weeks.saturating_mul(7))?;
                self.check_medical_clearance(record)?;
                self.check_goal(goal)
            }
            ChangeOp::SetWorkoutPlan(plan) => {
                self.check_workout_plan(plan, record)
            }
            // Profile updates, meal plans, progress entries, handoff
            // bookkeeping and conversation state carry no intensification
            // and pass through.
            _ => Ok(()),
        }
    }

    /// Text-level goal checks: minimum substance, no unsafe pace language.
    ///
    /// Also used by the coordinator before the checklist gate, so a
    /// "lose weight fast" turn is refused rather than interrogated.
    pub fn check_goal_text(&self, text: &str) -> Result<(), RejectReason> {
        if text.split_whitespace().count() < self.policy.min_goal_words {
            return Err(RejectReason::GoalTooVague);
        }

        let lowered = text.to_lowercase();
        for term in &self.policy.pace_deny_terms {
            if lowered
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == term)
            {
                return Err(RejectReason::UnsafePaceRequest);
            }
        }

        Ok(())
    }

    /// Implied weekly rate of change must stay within the safe bound
    pub fn check_progression_rate(
        &self,
        target_delta: f64,
        timeframe_days: u32,
    ) -> Result<(), RejectReason> {
        let weekly_rate = if timeframe_days == 0 {
            f64::INFINITY
        } else {
            target_delta.abs() / timeframe_days as f64 * 7.0
        };

        if weekly_rate > self.policy.safe_weekly_rate {
            return Err(RejectReason::UnsafeProgressionRate {
                weekly_rate,
                limit: self.policy.safe_weekly_rate,
            });
        }
        Ok(())
    }

    /// High-risk medical conditions block plan-intensifying changes until
    /// cleared out-of-band
    pub fn check_medical_clearance(&self, record: &SessionRecord) -> Result<(), RejectReason> {
        for condition in &record.profile.medical_conditions {
            if self.policy.high_risk_conditions.contains(condition) {
                return Err(RejectReason::MedicalClearanceRequired {
                    condition: condition.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_goal(&self, goal: &Goal) -> Result<(), RejectReason> {
        // Zero timeframe implies an unbounded rate
        if goal.timeframe_weeks == 0 {
            return Err(RejectReason::UnsafeProgressionRate {
                weekly_rate: f64::INFINITY,
                limit: self.policy.safe_weekly_rate,
            });
        }
        Ok(())
    }

    fn check_workout_plan(
        &self,
        plan: &WorkoutPlan,
        record: &SessionRecord,
    ) -> Result<(), RejectReason> {
        let age = record.profile.age.unwrap_or(FALLBACK_AGE);
        let max_heart_rate = (220 - age.min(219)) as f64;
        let limit = self.policy.max_heart_rate_fraction * max_heart_rate;

        if plan.intensity > limit {
            return Err(RejectReason::IntensityUnsafeForAge {
                intensity: plan.intensity,
                limit,
            });
        }

        if let Some(previous) = record.current_workout_plan() {
            let ceiling = previous.intensity * (1.0 + self.policy.max_intensity_increase);
            if plan.intensity > ceiling {
                return Err(RejectReason::ProgressionTooAggressive {
                    previous: previous.intensity,
                    proposed: plan.intensity,
                });
            }
            if plan.intensity > previous.intensity {
                self.check_medical_clearance(record)?;
            }
        } else {
            self.check_medical_clearance(record)?;
        }

        Ok(())
    }
}
