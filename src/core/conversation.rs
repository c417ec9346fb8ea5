//! Per-topic required-field checklists and follow-up questions.
//!
//! Topic identification and field extraction are delegated to the
//! understanding adapter; the tracker owns only the checklist logic:
//! which fields a topic needs, which are still missing, and what to ask.

use std::collections::HashMap;

use crate::domain::Topic;

/// Outcome of analyzing a turn against the topic's checklist
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationCheck {
    pub topic: Topic,
    /// Required fields not yet gathered, in checklist order
    pub missing_fields: Vec<String>,
    /// One deterministic question per missing field, same order
    pub follow_up_questions: Vec<String>,
}

impl ConversationCheck {
    /// Whether enough information exists to invoke a tool for this topic
    pub fn is_satisfied(&self) -> bool {
        self.missing_fields.is_empty()
    }
}

/// Checklist logic over the session's gathered fields
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationTracker;

impl ConversationTracker {
    pub fn new() -> Self {
        Self
    }

    /// Required fields per topic.
    ///
    /// Goal setting needs a target and a timeframe; the current status is
    /// sourced from the profile when available rather than demanded here.
    pub fn required_fields(topic: Topic) -> &'static [&'static str] {
        match topic {
            Topic::GoalSetting => &["target", "timeframe"],
            Topic::DietPlanning => &["dietary_restrictions", "allergies", "preferences"],
            Topic::WorkoutPlanning => &["fitness_level", "equipment_access", "time_availability"],
            Topic::ProgressUpdate | Topic::CheckinScheduling | Topic::General => &[],
        }
    }

    /// Compute missing fields and the questions to ask for them
    pub fn analyze(&self, topic: Topic, known: &HashMap<String, String>) -> ConversationCheck {
        let missing_fields: Vec<String> = Self::required_fields(topic)
            .iter()
            .filter(|field| !known.contains_key(**field))
            .map(|field| field.to_string())
            .collect();

        let follow_up_questions = missing_fields
            .iter()
            .map(|field| Self::question_for(field))
            .collect();

        ConversationCheck {
            topic,
            missing_fields,
            follow_up_questions,
        }
    }

    /// Deterministic question for a missing field, with a generic fallback
    pub fn question_for(field: &str) -> String {
        match field {
            "target" => "What specific goal would you like to achieve?".to_string(),
            "timeframe" => "In how much time would you like to achieve this goal?".to_string(),
            "dietary_restrictions" => {
                "Do you have any dietary restrictions I should know about?".to_string()
            }
            "allergies" => "Do you have any food allergies?".to_string(),
            "preferences" => "What kinds of food do you enjoy eating?".to_string(),
            "fitness_level" => {
                "How would you describe your fitness level: beginner, intermediate, or advanced?"
                    .to_string()
            }
            "equipment_access" => {
                "What equipment do you have access to: a gym, home weights, or none?".to_string()
            }
            "time_availability" => {
                "How much time can you set aside for workouts each week?".to_string()
            }
            other => format!("Could you please provide information about your {}?", other),
        }
    }
}
