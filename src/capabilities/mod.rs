//! Specialist capabilities the coordinator hands sessions off to.
//!
//! Each capability owns one area the general coaching loop defers on:
//! escalation to a human coach, injury-aware adjustment, and complex
//! nutrition. Capabilities receive the session read-only and return a
//! reply plus any record changes, which the coordinator commits through
//! the same guardrail gate as tool output.

mod escalation;
mod injury;
mod nutrition;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ChangeSet, SessionRecord, Urgency};

pub use escalation::EscalationDesk;
pub use injury::InjurySupport;
pub use nutrition::NutritionExpert;

/// Handoff targets the router can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Escalation,
    InjurySupport,
    NutritionExpert,
}

impl CapabilityKind {
    pub fn name(self) -> &'static str {
        match self {
            CapabilityKind::Escalation => "escalation",
            CapabilityKind::InjurySupport => "injury_support",
            CapabilityKind::NutritionExpert => "nutrition_expert",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a capability produced for the user and the record
#[derive(Debug, Clone, Default)]
pub struct CapabilityReply {
    pub text: String,
    pub payload: serde_json::Value,
    pub changes: ChangeSet,
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("capability failed: {0}")]
    Failed(String),
}

/// A specialist handler invoked after a handoff
#[async_trait]
pub trait Capability: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    async fn handle(
        &self,
        query: &str,
        record: &SessionRecord,
        urgency: Urgency,
        reason: &str,
    ) -> Result<CapabilityReply, CapabilityError>;
}

/// Lookup table from capability kind to handler
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<CapabilityKind, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(EscalationDesk));
        registry.register(Arc::new(InjurySupport));
        registry.register(Arc::new(NutritionExpert));
        registry
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities.insert(capability.kind(), capability);
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_kinds() {
        let registry = CapabilityRegistry::with_defaults();
        for kind in [
            CapabilityKind::Escalation,
            CapabilityKind::InjurySupport,
            CapabilityKind::NutritionExpert,
        ] {
            assert!(registry.get(kind).is_some(), "missing {}", kind);
        }
    }
}
