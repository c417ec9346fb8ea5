//! The session record: the single mutable state of one coaching conversation.
//!
//! A `SessionRecord` is owned by the coordinator for the lifetime of a
//! session and is only ever mutated through [`SessionRecord::apply`], which
//! the coordinator calls after the guardrail gate has accepted a change set.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::change::{ChangeError, ChangeOp, ChangeSet};

/// One coaching conversation's complete state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Stable opaque session/user identifier
    pub id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// User profile with derived BMI
    pub profile: Profile,

    /// Goals in creation order; append-only except status transitions
    pub goals: Vec<Goal>,

    /// Meal plans, oldest first; the last non-superseded one is current
    pub meal_plans: Vec<MealPlan>,

    /// Workout plans, oldest first; the last non-superseded one is current
    pub workout_plans: Vec<WorkoutPlan>,

    /// Progress entries, kept sorted by date at all times
    pub progress_history: Vec<ProgressEntry>,

    /// Append-only audit log of capability handoffs
    pub handoff_log: Vec<HandoffEntry>,

    /// Escalation state, if an escalation has been raised
    pub escalation: Option<EscalationState>,

    /// Per-session counters, reset at session start
    pub metrics: SessionMetrics,

    /// Current topic and outstanding checklist state
    pub conversation: ConversationState,

    /// Timestamp of the most recent turn
    pub last_interaction: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Create an empty record for a new session
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            profile: Profile::default(),
            goals: Vec::new(),
            meal_plans: Vec::new(),
            workout_plans: Vec::new(),
            progress_history: Vec::new(),
            handoff_log: Vec::new(),
            escalation: None,
            metrics: SessionMetrics::default(),
            conversation: ConversationState::default(),
            last_interaction: None,
        }
    }

    /// The meal plan currently in effect, if any
    pub fn current_meal_plan(&self) -> Option<&MealPlan> {
        self.meal_plans.iter().rev().find(|p| p.superseded_at.is_none())
    }

    /// The workout plan currently in effect, if any
    pub fn current_workout_plan(&self) -> Option<&WorkoutPlan> {
        self.workout_plans
            .iter()
            .rev()
            .find(|p| p.superseded_at.is_none())
    }

    /// The most recently created goal still active, if any
    pub fn active_goal(&self) -> Option<&Goal> {
        self.goals
            .iter()
            .rev()
            .find(|g| g.status == GoalStatus::Active)
    }

    /// Apply an accepted change set.
    ///
    /// This is the only mutation path. The coordinator calls it on a staged
    /// clone and swaps the clone in on success, so a failing op leaves the
    /// live record untouched.
    pub fn apply(&mut self, changes: &ChangeSet) -> Result<(), ChangeError> {
        for op in &changes.ops {
            self.apply_op(op)?;
        }
        Ok(())
    }

    fn apply_op(&mut self, op: &ChangeOp) -> Result<(), ChangeError> {
        match op {
            ChangeOp::UpdateProfile(patch) => {
                self.profile.merge(patch);
                self.profile.recompute_bmi();
            }
            ChangeOp::AddGoal(goal) => {
                self.goals.push(goal.clone());
            }
            ChangeOp::SetGoalStatus { goal_id, status } => {
                let goal = self
                    .goals
                    .iter_mut()
                    .find(|g| g.id == *goal_id)
                    .ok_or(ChangeError::GoalNotFound(*goal_id))?;
                goal.transition(*status)?;
            }
            ChangeOp::SetMealPlan(plan) => {
                let now = plan.created_at;
                for prior in &mut self.meal_plans {
                    if prior.superseded_at.is_none() {
                        prior.superseded_at = Some(now);
                    }
                }
                self.meal_plans.push(plan.clone());
            }
            ChangeOp::SetWorkoutPlan(plan) => {
                let now = plan.created_at;
                for prior in &mut self.workout_plans {
                    if prior.superseded_at.is_none() {
                        prior.superseded_at = Some(now);
                    }
                }
                self.workout_plans.push(plan.clone());
            }
            ChangeOp::AddProgress(entry) => {
                self.insert_progress(entry.clone());
                if entry.weight_kg.is_some() {
                    self.profile.weight_kg = entry.weight_kg;
                    self.profile.recompute_bmi();
                }
            }
            ChangeOp::LogHandoff(entry) => {
                // Appended and counted in the same op so the log length and
                // the handoffs counter can never diverge.
                self.handoff_log.push(entry.clone());
                self.metrics.handoffs += 1;
            }
            ChangeOp::SetEscalation(state) => {
                self.escalation = Some(state.clone());
            }
            ChangeOp::SetDietaryPreferences(prefs) => {
                self.profile.dietary_preferences = prefs.clone();
            }
            ChangeOp::AddMedicalCondition(condition) => {
                if !self.profile.medical_conditions.contains(condition) {
                    self.profile.medical_conditions.push(condition.clone());
                }
            }
            ChangeOp::SetConversation(state) => {
                self.conversation = state.clone();
            }
        }
        Ok(())
    }

    /// Insert a progress entry keeping the history sorted by date.
    ///
    /// Entries with equal dates keep arrival order.
    fn insert_progress(&mut self, entry: ProgressEntry) {
        let idx = self
            .progress_history
            .partition_point(|e| e.date <= entry.date);
        self.progress_history.insert(idx, entry);
    }
}

/// User profile fields the core reads and writes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub age: Option<u32>,
    pub sex: Option<BiologicalSex>,
    /// Height in centimeters
    pub height_cm: Option<f64>,
    /// Weight in kilograms
    pub weight_kg: Option<f64>,
    /// Derived; recomputed whenever weight or height changes
    pub bmi: Option<f64>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    pub fitness_level: Option<String>,
}

impl Profile {
    /// Recompute BMI from current weight and height.
    ///
    /// BMI = weight / height² with height in meters. Cleared when either
    /// input is missing, so a stale value can never be read.
    pub fn recompute_bmi(&mut self) {
        self.bmi = match (self.weight_kg, self.height_cm) {
            (Some(w), Some(h)) if h > 0.0 => {
                let meters = h / 100.0;
                Some(w / (meters * meters))
            }
            _ => None,
        };
    }

    fn merge(&mut self, patch: &ProfilePatch) {
        if let Some(age) = patch.age {
            self.age = Some(age);
        }
        if let Some(sex) = patch.sex {
            self.sex = Some(sex);
        }
        if let Some(h) = patch.height_cm {
            self.height_cm = Some(h);
        }
        if let Some(w) = patch.weight_kg {
            self.weight_kg = Some(w);
        }
        if let Some(ref level) = patch.fitness_level {
            self.fitness_level = Some(level.clone());
        }
    }
}

/// Partial profile update carried in a change set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub age: Option<u32>,
    pub sex: Option<BiologicalSex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub fitness_level: Option<String>,
}

/// Biological sex category used for derived metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiologicalSex {
    Female,
    Male,
    Unspecified,
}

/// A user goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    /// e.g. "weight_loss", "muscle_gain", "endurance"
    pub goal_type: String,
    /// The user's own wording
    pub description: String,
    /// Target change in the tracked metric's unit (kg for weight goals)
    pub target_value: f64,
    pub timeframe_weeks: u32,
    pub status: GoalStatus,
    /// Supporting numbers derived at analysis time (calorie deficit etc.)
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(
        goal_type: impl Into<String>,
        description: impl Into<String>,
        target_value: f64,
        timeframe_weeks: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_type: goal_type.into(),
            description: description.into(),
            target_value,
            timeframe_weeks,
            status: GoalStatus::Active,
            metrics: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Transition to a new status.
    ///
    /// Only active goals may transition; completed and abandoned are
    /// terminal.
    pub fn transition(&mut self, status: GoalStatus) -> Result<(), ChangeError> {
        if self.status != GoalStatus::Active {
            return Err(ChangeError::TerminalGoalTransition {
                goal_id: self.id,
                current: self.status,
            });
        }
        self.status = status;
        Ok(())
    }

    /// The change the goal implies per week, in the metric's unit
    pub fn weekly_rate(&self) -> f64 {
        if self.timeframe_weeks == 0 {
            return f64::INFINITY;
        }
        self.target_value.abs() / self.timeframe_weeks as f64
    }
}

/// Goal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Abandoned,
}

impl GoalStatus {
    pub fn is_terminal(self) -> bool {
        self != GoalStatus::Active
    }
}

/// A generated meal plan. Superseded plans are kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub id: Uuid,
    /// Goal this plan serves, if tied to one
    pub goal_id: Option<Uuid>,
    pub calories_target: u32,
    pub daily_plans: Vec<DayMeals>,
    pub shopping_list: Vec<String>,
    /// Average daily values per nutrient
    pub nutritional_summary: HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
    /// Set when a newer plan replaces this one
    pub superseded_at: Option<DateTime<Utc>>,
}

/// One day of meals within a meal plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMeals {
    pub day: String,
    pub breakfast: String,
    pub lunch: String,
    pub dinner: String,
    #[serde(default)]
    pub snacks: Vec<String>,
}

/// A generated workout plan. Superseded plans are kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub id: Uuid,
    pub goal_id: Option<Uuid>,
    pub weekly_schedule: Vec<WorkoutDay>,
    /// Per-exercise progression notes
    pub progression_plan: HashMap<String, String>,
    /// Target heart rate in beats per minute
    pub intensity: f64,
    pub created_at: DateTime<Utc>,
    pub superseded_at: Option<DateTime<Utc>>,
}

/// One scheduled training day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDay {
    pub day: String,
    pub focus: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub exercises: Vec<String>,
}

/// A single progress check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub date: DateTime<Utc>,
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub measurements: HashMap<String, f64>,
    /// Self-reported 1-10
    pub energy_level: Option<u8>,
    /// Fraction of planned workouts completed, 0.0-1.0
    pub workout_compliance: Option<f64>,
    /// Fraction of planned meals followed, 0.0-1.0
    pub diet_compliance: Option<f64>,
    pub notes: Option<String>,
}

impl ProgressEntry {
    pub fn on(date: DateTime<Utc>) -> Self {
        Self {
            date,
            weight_kg: None,
            measurements: HashMap::new(),
            energy_level: None,
            workout_compliance: None,
            diet_compliance: None,
            notes: None,
        }
    }
}

/// One entry in the append-only handoff audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffEntry {
    pub at: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub reason: String,
    pub urgency: Urgency,
}

/// How quickly a handoff needs human attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Medium => write!(f, "medium"),
            Urgency::High => write!(f, "high"),
        }
    }
}

/// Escalation state; overwritten, not appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationState {
    pub status: EscalationPhase,
    pub detail: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPhase {
    PendingReview,
    Resolved,
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub tool_calls: u64,
    pub handoffs: u64,
}

/// Conversation topics the coordinator routes between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    GoalSetting,
    DietPlanning,
    WorkoutPlanning,
    ProgressUpdate,
    CheckinScheduling,
    General,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::GoalSetting => "goal_setting",
            Topic::DietPlanning => "diet_planning",
            Topic::WorkoutPlanning => "workout_planning",
            Topic::ProgressUpdate => "progress_update",
            Topic::CheckinScheduling => "checkin_scheduling",
            Topic::General => "general",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checklist state carried between turns of the same topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub topic: Option<Topic>,
    /// Fields gathered so far for the current topic
    #[serde(default)]
    pub known_fields: HashMap<String, String>,
    /// Required fields still missing for the current topic
    #[serde(default)]
    pub missing_fields: Vec<String>,
    /// Questions surfaced to the user on the last turn
    #[serde(default)]
    pub pending_questions: Vec<String>,
    /// Consecutive turns that failed to produce a usable intent
    #[serde(default)]
    pub failed_clarifications: u32,
}
