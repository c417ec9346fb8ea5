//! The per-turn response object handed to the presentation layer.

use serde::{Deserialize, Serialize};

/// What a turn produced for the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Conversational text to show the user
    pub text: String,

    /// Structured result (plan tables, metrics, coach summary), if any
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,

    /// Questions the user should answer before the topic can proceed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_questions: Vec<String>,

    /// Which tool or capability produced the response
    pub handled_by: String,
}

impl TurnResponse {
    /// A plain-text response
    pub fn text(handled_by: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            payload: serde_json::Value::Null,
            follow_up_questions: Vec::new(),
            handled_by: handled_by.into(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_questions(mut self, questions: Vec<String>) -> Self {
        self.follow_up_questions = questions;
        self
    }
}
