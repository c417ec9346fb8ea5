//! Observation hooks around the turn lifecycle.
//!
//! Hooks are read-only observers. They see the session at well-defined
//! points but cannot alter it, so a misbehaving hook can never corrupt
//! a turn.

use std::sync::Arc;

use tracing::{debug, info};

use crate::capabilities::CapabilityKind;
use crate::domain::{SessionRecord, Urgency};
use crate::tools::ToolKind;

/// Callbacks fired at turn boundaries. All methods default to no-ops so
/// implementors override only what they watch.
pub trait SessionHook: Send + Sync {
    fn on_turn_start(&self, _record: &SessionRecord, _text: &str) {}

    fn on_tool_start(&self, _record: &SessionRecord, _tool: ToolKind) {}

    fn on_tool_end(&self, _record: &SessionRecord, _tool: ToolKind, _succeeded: bool) {}

    fn on_handoff(&self, _record: &SessionRecord, _target: CapabilityKind, _urgency: Urgency) {}

    fn on_turn_end(&self, _record: &SessionRecord) {}
}

/// Fans events out to registered hooks in registration order.
#[derive(Default)]
pub struct HookDispatcher {
    hooks: Vec<Arc<dyn SessionHook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn SessionHook>) {
        self.hooks.push(hook);
    }

    pub fn turn_start(&self, record: &SessionRecord, text: &str) {
        for hook in &self.hooks {
            hook.on_turn_start(record, text);
        }
    }

    pub fn tool_start(&self, record: &SessionRecord, tool: ToolKind) {
        for hook in &self.hooks {
            hook.on_tool_start(record, tool);
        }
    }

    pub fn tool_end(&self, record: &SessionRecord, tool: ToolKind, succeeded: bool) {
        for hook in &self.hooks {
            hook.on_tool_end(record, tool, succeeded);
        }
    }

    pub fn handoff(&self, record: &SessionRecord, target: CapabilityKind, urgency: Urgency) {
        for hook in &self.hooks {
            hook.on_handoff(record, target, urgency);
        }
    }

    pub fn turn_end(&self, record: &SessionRecord) {
        for hook in &self.hooks {
            hook.on_turn_end(record);
        }
    }
}

/// Default hook: structured log lines at each boundary.
pub struct LoggingHook;

impl SessionHook for LoggingHook {
    fn on_turn_start(&self, record: &SessionRecord, text: &str) {
        debug!(session = %record.id, chars = text.len(), "turn started");
    }

    fn on_tool_start(&self, record: &SessionRecord, tool: ToolKind) {
        debug!(session = %record.id, tool = tool.name(), "tool starting");
    }

    fn on_tool_end(&self, record: &SessionRecord, tool: ToolKind, succeeded: bool) {
        info!(session = %record.id, tool = tool.name(), succeeded, "tool finished");
    }

    fn on_handoff(&self, record: &SessionRecord, target: CapabilityKind, urgency: Urgency) {
        info!(session = %record.id, target = %target, urgency = %urgency, "handing off");
    }

    fn on_turn_end(&self, record: &SessionRecord) {
        debug!(
            session = %record.id,
            tool_calls = record.metrics.tool_calls,
            handoffs = record.metrics.handoffs,
            "turn finished"
        );
    }
}
