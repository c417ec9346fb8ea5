//! The tool contract: a fixed four-phase lifecycle every tool implements.
//!
//! Phases: validate (structural preconditions), pre-execute (enrichment and
//! domain guardrails), execute (the only phase allowed external I/O,
//! wrapped in bounded retry), post-execute (pure idempotent shaping).
//! Tools never mutate the session record; they return a [`ChangeSet`] the
//! coordinator gates and commits.

pub mod checkin_scheduler;
pub mod goal_analyzer;
pub mod meal_planner;
pub mod progress_tracker;
pub mod workout_recommender;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::adapters::{AdapterError, CompletionService};
use crate::core::guardrails::{GuardrailEngine, RejectReason};
use crate::core::retry::{RetryError, RetryExecutor, RetryPolicy, Transient};
use crate::domain::{ChangeSet, SessionRecord};

pub use checkin_scheduler::CheckinScheduler;
pub use goal_analyzer::GoalAnalyzer;
pub use meal_planner::MealPlanner;
pub use progress_tracker::ProgressTracker;
pub use workout_recommender::WorkoutRecommender;

/// The closed set of local tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    GoalAnalyzer,
    MealPlanner,
    WorkoutRecommender,
    ProgressTracker,
    CheckinScheduler,
}

impl ToolKind {
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::GoalAnalyzer => "goal_analyzer",
            ToolKind::MealPlanner => "meal_planner",
            ToolKind::WorkoutRecommender => "workout_recommender",
            ToolKind::ProgressTracker => "progress_tracker",
            ToolKind::CheckinScheduler => "checkin_scheduler",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Input to a tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolParams {
    /// The raw turn text
    pub text: String,

    /// Fields gathered by the conversation tracker for this topic
    pub fields: HashMap<String, String>,
}

impl ToolParams {
    pub fn new(text: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            text: text.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Parse a named field as f64
    pub fn numeric_field(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(|v| v.parse().ok())
    }
}

/// What a tool produced
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Conversational text for the user
    pub text: String,

    /// Structured result for the presentation layer
    pub payload: serde_json::Value,

    /// Proposed record mutations, still ungated
    pub changes: ChangeSet,
}

/// Errors from the tool lifecycle
#[derive(Debug, Error)]
pub enum ToolError {
    /// Structural precondition failed; never retried
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A domain guardrail rejected the parameters; never retried
    #[error("{0}")]
    Rejected(RejectReason),

    /// Transient external failure in the execute phase; retried
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retry budget exhausted
    #[error("execution failed after {attempts} attempts: {last_error}")]
    Exhausted { last_error: String, attempts: u32 },

    /// Anything else; never retried
    #[error("tool failure: {0}")]
    Internal(String),
}

impl Transient for ToolError {
    fn is_transient(&self) -> bool {
        matches!(self, ToolError::Transient(_))
    }
}

impl From<AdapterError> for ToolError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Transient(msg) => ToolError::Transient(msg),
            AdapterError::Malformed(msg) => ToolError::Internal(msg),
            AdapterError::Unavailable(msg) => ToolError::Transient(msg),
        }
    }
}

/// The four-phase tool lifecycle
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Structural/semantic precondition check; failure means the user needs
    /// to clarify, not that anything broke
    fn validate_input(&self, params: &ToolParams) -> Result<(), ToolError>;

    /// Enrich and normalize params; run this tool's domain guardrails
    async fn pre_execute(
        &self,
        params: ToolParams,
        record: &SessionRecord,
        guardrails: &GuardrailEngine,
    ) -> Result<ToolParams, ToolError>;

    /// The actual, possibly externally-bound action. The only phase
    /// permitted to perform I/O; transient failures here are retried.
    async fn execute(
        &self,
        params: &ToolParams,
        record: &SessionRecord,
    ) -> Result<ToolOutput, ToolError>;

    /// Pure, idempotent shaping of the final result
    fn post_execute(&self, output: ToolOutput) -> ToolOutput {
        output
    }

    /// Tool-specific retry policy; None uses the runner's default
    fn retry_policy(&self) -> Option<RetryPolicy> {
        None
    }
}

/// Sequences the lifecycle and wraps the execute phase in bounded retry
pub struct ToolRunner {
    retry: RetryPolicy,
}

impl ToolRunner {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub async fn invoke(
        &self,
        tool: &dyn Tool,
        params: ToolParams,
        record: &SessionRecord,
        guardrails: &GuardrailEngine,
    ) -> Result<ToolOutput, ToolError> {
        debug!(tool = %tool.kind(), "Validating tool input");
        tool.validate_input(&params)?;

        let params = tool.pre_execute(params, record, guardrails).await?;

        let policy = tool.retry_policy().unwrap_or_else(|| self.retry.clone());
        let executor = RetryExecutor::new(policy);

        let result = executor.run(|| tool.execute(&params, record)).await;

        match result {
            Ok(output) => Ok(tool.post_execute(output)),
            Err(RetryError::Fatal(e)) => Err(e),
            Err(RetryError::Exhausted(failure)) => Err(ToolError::Exhausted {
                last_error: failure.last_error.to_string(),
                attempts: failure.attempts,
            }),
        }
    }
}

/// The coordinator's closed tool table
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// All five standard tools backed by the given completion service
    pub fn with_defaults(completion: Arc<dyn CompletionService>) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(GoalAnalyzer::new(completion.clone())));
        registry.register(Arc::new(MealPlanner::new(completion.clone())));
        registry.register(Arc::new(WorkoutRecommender::new(completion.clone())));
        registry.register(Arc::new(ProgressTracker::new(completion.clone())));
        registry.register(Arc::new(CheckinScheduler::new(completion)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(&kind).cloned()
    }
}
