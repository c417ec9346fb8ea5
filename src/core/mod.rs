//! Orchestration logic: routing, guardrails, conversation checklists,
//! retry, hooks, and the session coordinator that ties them together.

pub mod conversation;
pub mod coordinator;
pub mod guardrails;
pub mod hooks;
pub mod retry;
pub mod router;
pub mod stream;

pub use conversation::{ConversationCheck, ConversationTracker};
pub use coordinator::{SessionCoordinator, TurnPhase};
pub use guardrails::{GuardrailEngine, GuardrailOutcome, RejectReason};
pub use hooks::{HookDispatcher, LoggingHook, SessionHook};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Transient};
pub use router::{Router, RoutingDecision};
pub use stream::ResponseStream;
