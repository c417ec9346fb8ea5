//! Adapter interfaces for external collaborators.
//!
//! Two boundaries live here:
//! - [`Understanding`]: intent classification and field extraction. The
//!   core layers deterministic checklist and routing logic on top of
//!   whatever this returns, and treats malformed output as recoverable.
//! - [`CompletionService`]: the opaque text-completion service tools call
//!   during their execute phase.

pub mod http;
pub mod keyword;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Topic;

pub use http::HttpCompletion;
pub use keyword::KeywordUnderstanding;

/// What the understanding service made of a turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    /// Identified topic, if any
    pub topic: Option<Topic>,

    /// Fields extracted from the turn text (target, timeframe, ...)
    pub fields: HashMap<String, String>,

    /// Routing-relevant signals found in the text
    pub signals: Vec<Signal>,
}

impl Intent {
    pub fn has_crisis_signal(&self) -> bool {
        self.signals.iter().any(|s| matches!(s, Signal::Crisis(_)))
    }
}

/// A routing-relevant signal detected in turn text
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Explicit crisis language; always escalates with high urgency
    Crisis(String),

    /// Injury mention; routes to injury support
    Injury(String),

    /// Nutrition question complicated by medical conditions
    ComplexNutrition(String),
}

/// Errors at the adapter boundary
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Transient external failure; safe to retry
    #[error("transient adapter failure: {0}")]
    Transient(String),

    /// The service answered, but unusably
    #[error("malformed adapter output: {0}")]
    Malformed(String),

    /// The service cannot be reached at all
    #[error("adapter unavailable: {0}")]
    Unavailable(String),
}

/// Text understanding: classification and field extraction.
///
/// Implementations may be arbitrarily unreliable; the core never treats
/// their errors as fatal.
#[async_trait]
pub trait Understanding: Send + Sync {
    async fn classify_intent(&self, text: &str) -> Result<Intent, AdapterError>;

    async fn extract_fields(
        &self,
        text: &str,
        topic: Topic,
    ) -> Result<HashMap<String, String>, AdapterError>;
}

/// Opaque text-completion service with a single request/response contract
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Complete a prompt within the given timeout.
    ///
    /// Exceeding the timeout is a transient failure, not a silent hang.
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, AdapterError>;
}

/// Deterministic completion backend used by default and in tests.
///
/// Produces a short templated acknowledgment derived from the prompt so
/// tool output stays stable without a live model.
#[derive(Debug, Clone, Default)]
pub struct CannedCompletion;

#[async_trait]
impl CompletionService for CannedCompletion {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, AdapterError> {
        let gist: String = prompt.split_whitespace().take(8).collect::<Vec<_>>().join(" ");
        Ok(format!("Noted: {}.", gist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_completion_is_deterministic() {
        let backend = CannedCompletion;
        let a = backend
            .complete("plan a steady week", Duration::from_secs(1))
            .await
            .unwrap();
        let b = backend
            .complete("plan a steady week", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
