//! Proposed changes to a session record.
//!
//! Tools and capabilities never mutate the record directly. They return a
//! [`ChangeSet`] that the coordinator passes through the guardrail engine
//! and then applies atomically, or discards whole.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::session::{
    ConversationState, EscalationState, Goal, GoalStatus, HandoffEntry, MealPlan, ProfilePatch,
    ProgressEntry, WorkoutPlan,
};

/// An ordered set of uncommitted mutations awaiting guardrail approval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub ops: Vec<ChangeOp>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A change set with a single op
    pub fn single(op: ChangeOp) -> Self {
        Self { ops: vec![op] }
    }

    pub fn push(&mut self, op: ChangeOp) {
        self.ops.push(op);
    }

    /// Append all ops from another change set
    pub fn merge(&mut self, other: ChangeSet) {
        self.ops.extend(other.ops);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A single proposed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOp {
    UpdateProfile(ProfilePatch),
    AddGoal(Goal),
    SetGoalStatus { goal_id: Uuid, status: GoalStatus },
    SetMealPlan(MealPlan),
    SetWorkoutPlan(WorkoutPlan),
    AddProgress(ProgressEntry),
    LogHandoff(HandoffEntry),
    SetEscalation(EscalationState),
    SetDietaryPreferences(Vec<String>),
    AddMedicalCondition(String),
    SetConversation(ConversationState),
}

/// Errors from applying a change set
#[derive(Debug, Clone, Error)]
pub enum ChangeError {
    #[error("goal {0} not found")]
    GoalNotFound(Uuid),

    #[error("goal {goal_id} is {current:?}; terminal states cannot transition")]
    TerminalGoalTransition { goal_id: Uuid, current: GoalStatus },
}
