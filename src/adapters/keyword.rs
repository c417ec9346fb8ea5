//! Deterministic keyword/regex implementation of [`Understanding`].
//!
//! Good enough to drive the coordinator without a live language model and
//! exact enough to test routing and checklist behavior against.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RoutingPolicy;
use crate::domain::Topic;

use super::{AdapterError, Intent, Signal, Understanding};

static RE_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:lose|drop|shed|gain|build|put on)\s+(\d+(?:\.\d+)?)\s*(?:kg|kilos?|kilograms?|lbs?|pounds?)\b")
        .expect("target regex")
});

static RE_TIMEFRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:in|over|within)\s+(\d+)\s*(day|week|month)s?\b").expect("timeframe regex")
});

static RE_CURRENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:currently|right now|now)\s+(?:weigh\s+|at\s+)?(\d+(?:\.\d+)?)\s*kg\b")
        .expect("current regex")
});

static RE_WEIGHT_LOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:weighed?(?:\s+in\s+at)?|weight\s+is)\s+(\d+(?:\.\d+)?)\s*kg\b")
        .expect("weight log regex")
});

static RE_FITNESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(beginner|intermediate|advanced)\b").expect("fitness regex"));

static RE_TIME_AVAILABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+\s*(?:minutes?|mins?|hours?)(?:\s+(?:per|a|each)\s+(?:day|week))?)\b")
        .expect("time regex")
});

static RE_ALLERGIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\ballergic\s+to\s+([a-z][a-z ,]*[a-z])").expect("allergy regex")
});

const RESTRICTION_TERMS: &[&str] = &[
    "vegetarian",
    "vegan",
    "pescatarian",
    "halal",
    "kosher",
    "gluten-free",
    "gluten free",
    "dairy-free",
    "dairy free",
    "low-carb",
    "low carb",
];

const EQUIPMENT_TERMS: &[&str] = &["gym", "dumbbell", "barbell", "home weights", "bodyweight", "no equipment"];

const MEDICAL_TERMS: &[&str] = &[
    "diabetes",
    "diabetic",
    "hypertension",
    "blood pressure",
    "celiac",
    "kidney",
    "medication",
    "pregnan",
];

/// Keyword/regex intent classifier and field extractor
#[derive(Debug, Clone)]
pub struct KeywordUnderstanding {
    routing: RoutingPolicy,
}

impl KeywordUnderstanding {
    pub fn new(routing: RoutingPolicy) -> Self {
        Self { routing }
    }

    fn identify_topic(text: &str) -> Option<Topic> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        // Single-word terms match whole words ("eat" must not match
        // "weather"); phrases match as substrings.
        let has = |terms: &[&str]| {
            terms.iter().any(|t| {
                if t.contains(' ') || t.contains('-') {
                    lowered.contains(t)
                } else {
                    words.iter().any(|w| w == t)
                }
            })
        };

        // Most specific first: scheduling and logging phrases also mention
        // goals and workouts.
        if has(&["schedule", "remind", "reminder", "check-in", "checkin"]) {
            return Some(Topic::CheckinScheduling);
        }
        if has(&["progress", "weighed", "weigh-in", "logged", "compliance"]) {
            return Some(Topic::ProgressUpdate);
        }
        if has(&["workout", "exercise", "training", "gym", "strength", "cardio"]) {
            return Some(Topic::WorkoutPlanning);
        }
        if has(&["meal", "diet", "nutrition", "eat", "food", "recipe"]) {
            return Some(Topic::DietPlanning);
        }
        if has(&["goal", "lose", "gain", "target", "aim"]) {
            return Some(Topic::GoalSetting);
        }
        None
    }

    fn detect_signals(&self, text: &str, topic: Option<Topic>) -> Vec<Signal> {
        let lowered = text.to_lowercase();
        let mut signals = Vec::new();

        for term in &self.routing.crisis_terms {
            if lowered.contains(term.as_str()) {
                signals.push(Signal::Crisis(term.clone()));
            }
        }

        for term in &self.routing.injury_terms {
            if lowered.contains(term.as_str()) {
                signals.push(Signal::Injury(term.clone()));
            }
        }

        if topic == Some(Topic::DietPlanning) {
            for term in MEDICAL_TERMS {
                if lowered.contains(term) {
                    signals.push(Signal::ComplexNutrition(term.to_string()));
                    break;
                }
            }
        }

        signals
    }

    fn timeframe_weeks(amount: u64, unit: &str) -> u64 {
        match unit {
            "day" => amount.div_ceil(7).max(1),
            "month" => amount.saturating_mul(4),
            _ => amount,
        }
    }
}

#[async_trait]
impl Understanding for KeywordUnderstanding {
    async fn classify_intent(&self, text: &str) -> Result<Intent, AdapterError> {
        if text.trim().is_empty() {
            return Err(AdapterError::Malformed("empty turn text".to_string()));
        }

        let topic = Self::identify_topic(text);
        let signals = self.detect_signals(text, topic);
        let fields = match topic {
            Some(t) => self.extract_fields(text, t).await?,
            None => HashMap::new(),
        };

        Ok(Intent {
            topic,
            fields,
            signals,
        })
    }

    async fn extract_fields(
        &self,
        text: &str,
        topic: Topic,
    ) -> Result<HashMap<String, String>, AdapterError> {
        let lowered = text.to_lowercase();
        let mut fields = HashMap::new();

        match topic {
            Topic::GoalSetting => {
                if let Some(caps) = RE_TARGET.captures(text) {
                    fields.insert("target".to_string(), caps[1].to_string());
                }
                if let Some(caps) = RE_TIMEFRAME.captures(text) {
                    let amount: u64 = caps[1].parse().unwrap_or(0);
                    let weeks = Self::timeframe_weeks(amount, &caps[2].to_lowercase());
                    fields.insert("timeframe".to_string(), weeks.to_string());
                }
                if let Some(caps) = RE_CURRENT.captures(text) {
                    fields.insert("current_status".to_string(), caps[1].to_string());
                }
            }
            Topic::DietPlanning => {
                let restrictions: Vec<&str> = RESTRICTION_TERMS
                    .iter()
                    .filter(|t| lowered.contains(**t))
                    .copied()
                    .collect();
                if !restrictions.is_empty() {
                    fields.insert("dietary_restrictions".to_string(), restrictions.join(", "));
                } else if lowered.contains("no restriction") {
                    fields.insert("dietary_restrictions".to_string(), "none".to_string());
                }
                if let Some(caps) = RE_ALLERGIC.captures(text) {
                    fields.insert("allergies".to_string(), caps[1].trim().to_string());
                } else if lowered.contains("no allerg") {
                    fields.insert("allergies".to_string(), "none".to_string());
                }
                if let Some(idx) = ["like", "love", "prefer", "enjoy"]
                    .iter()
                    .filter_map(|w| lowered.find(&format!("i {} ", w)).map(|i| (i, w.len())))
                    .map(|(i, wlen)| i + 2 + wlen + 1)
                    .next()
                {
                    let rest: String = lowered[idx..]
                        .chars()
                        .take_while(|c| c.is_alphabetic() || c.is_whitespace())
                        .collect();
                    let rest = rest.trim();
                    if !rest.is_empty() {
                        fields.insert("preferences".to_string(), rest.to_string());
                    }
                }
            }
            Topic::WorkoutPlanning => {
                if let Some(caps) = RE_FITNESS.captures(text) {
                    fields.insert("fitness_level".to_string(), caps[1].to_lowercase());
                }
                for term in EQUIPMENT_TERMS {
                    if lowered.contains(term) {
                        fields.insert("equipment_access".to_string(), term.to_string());
                        break;
                    }
                }
                if let Some(caps) = RE_TIME_AVAILABLE.captures(text) {
                    fields.insert("time_availability".to_string(), caps[1].to_lowercase());
                }
            }
            Topic::ProgressUpdate => {
                if let Some(caps) = RE_WEIGHT_LOG
                    .captures(text)
                    .or_else(|| RE_CURRENT.captures(text))
                {
                    fields.insert("weight".to_string(), caps[1].to_string());
                }
                fields.insert("notes".to_string(), text.trim().to_string());
            }
            Topic::CheckinScheduling => {
                for freq in ["daily", "weekly", "biweekly", "monthly"] {
                    if lowered.contains(freq) {
                        fields.insert("frequency".to_string(), freq.to_string());
                        break;
                    }
                }
            }
            Topic::General => {}
        }

        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn understanding() -> KeywordUnderstanding {
        KeywordUnderstanding::new(RoutingPolicy::default())
    }

    #[tokio::test]
    async fn test_goal_intent_with_target_and_timeframe() {
        let intent = understanding()
            .classify_intent("I want to lose 4 kg over 8 weeks")
            .await
            .unwrap();

        assert_eq!(intent.topic, Some(Topic::GoalSetting));
        assert_eq!(intent.fields.get("target").unwrap(), "4");
        assert_eq!(intent.fields.get("timeframe").unwrap(), "8");
        assert!(intent.signals.is_empty());
    }

    #[tokio::test]
    async fn test_timeframe_in_days_converted_to_weeks() {
        let fields = understanding()
            .extract_fields("lose 2 kg in 28 days", Topic::GoalSetting)
            .await
            .unwrap();
        assert_eq!(fields.get("timeframe").unwrap(), "4");
    }

    #[tokio::test]
    async fn test_crisis_signal_detected() {
        let intent = understanding()
            .classify_intent("I have severe chest pain, and also what should I eat?")
            .await
            .unwrap();
        assert!(intent.has_crisis_signal());
    }

    #[tokio::test]
    async fn test_injury_signal_detected() {
        let intent = understanding()
            .classify_intent("I injured my knee during training yesterday")
            .await
            .unwrap();
        assert!(intent
            .signals
            .iter()
            .any(|s| matches!(s, Signal::Injury(_))));
    }

    #[tokio::test]
    async fn test_diet_with_medical_terms_flagged_complex() {
        let intent = understanding()
            .classify_intent("I need a meal plan that works with my diabetes")
            .await
            .unwrap();
        assert_eq!(intent.topic, Some(Topic::DietPlanning));
        assert!(intent
            .signals
            .iter()
            .any(|s| matches!(s, Signal::ComplexNutrition(_))));
    }

    #[tokio::test]
    async fn test_empty_text_is_malformed() {
        let result = understanding().classify_intent("   ").await;
        assert!(matches!(result, Err(AdapterError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unrecognized_text_has_no_topic() {
        let intent = understanding()
            .classify_intent("hello there, nice weather")
            .await
            .unwrap();
        assert_eq!(intent.topic, None);
    }
}
