//! Domain types for the wellspring coordinator.
//!
//! This module contains the core data structures:
//! - SessionRecord: one conversation's complete mutable state
//! - ChangeSet: uncommitted mutations awaiting guardrail approval
//! - TurnResponse: what a turn hands back to the presentation layer

pub mod change;
pub mod response;
pub mod session;

pub use change::{ChangeError, ChangeOp, ChangeSet};
pub use response::TurnResponse;
pub use session::{
    BiologicalSex, ConversationState, DayMeals, EscalationPhase, EscalationState, Goal,
    GoalStatus, HandoffEntry, MealPlan, Profile, ProfilePatch, ProgressEntry, SessionMetrics,
    SessionRecord, Topic, Urgency, WorkoutDay, WorkoutPlan,
};
