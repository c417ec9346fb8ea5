//! Configuration for the wellspring coordinator.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variable (WELLSPRING_HOME)
//! 2. Config file (~/.wellspring/config.yaml)
//! 3. Defaults
//!
//! All safety thresholds live here rather than in code: the guardrail
//! bounds, the escalation trigger lists, and the retry defaults are
//! deployment policy, not program logic.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoachConfig {
    /// Guardrail thresholds and deny-lists
    #[serde(default)]
    pub guardrails: GuardrailPolicy,

    /// Routing trigger vocabulary
    #[serde(default)]
    pub routing: RoutingPolicy,

    /// Default retry behavior for tool execution
    #[serde(default)]
    pub retry: RetryConfig,

    /// Completion service endpoint; None selects the canned backend
    pub completion_endpoint: Option<String>,
}

impl CoachConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content).context("Failed to parse config YAML")
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load_default() -> Result<Self> {
        let path = home_dir()?.join("config.yaml");
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Get the wellspring home directory (~/.wellspring or $WELLSPRING_HOME)
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("WELLSPRING_HOME") {
        return Ok(PathBuf::from(home));
    }
    let base = dirs::home_dir().context("Could not determine home directory")?;
    Ok(base.join(".wellspring"))
}

/// Default path for the session database
pub fn sessions_db_path() -> Result<PathBuf> {
    Ok(home_dir()?.join("sessions.db"))
}

/// Guardrail thresholds.
///
/// Defaults follow established coaching safety bounds; each is a policy
/// knob, not a constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    /// Maximum safe tracked-metric change per week (kg/week for weight)
    #[serde(default = "default_safe_weekly_rate")]
    pub safe_weekly_rate: f64,

    /// Fraction of (220 - age) a workout's target heart rate may not exceed
    #[serde(default = "default_max_heart_rate_fraction")]
    pub max_heart_rate_fraction: f64,

    /// Maximum allowed intensity increase over the previous workout plan
    /// (0.10 = 10%)
    #[serde(default = "default_max_intensity_increase")]
    pub max_intensity_increase: f64,

    /// Minimum word count for a goal description to be actionable
    #[serde(default = "default_min_goal_words")]
    pub min_goal_words: usize,

    /// Words that signal an unsafe pace request in goal text
    #[serde(default = "default_pace_deny_terms")]
    pub pace_deny_terms: Vec<String>,

    /// Medical condition tags that require clearance before any
    /// plan-intensifying change
    #[serde(default = "default_high_risk_conditions")]
    pub high_risk_conditions: Vec<String>,
}

fn default_safe_weekly_rate() -> f64 {
    1.0
}
fn default_max_heart_rate_fraction() -> f64 {
    0.85
}
fn default_max_intensity_increase() -> f64 {
    0.10
}
fn default_min_goal_words() -> usize {
    3
}

fn default_pace_deny_terms() -> Vec<String> {
    ["immediate", "fast", "quick", "rapid", "asap", "overnight", "crash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_high_risk_conditions() -> Vec<String> {
    [
        "heart_disease",
        "uncontrolled_diabetes",
        "severe_hypertension",
        "recent_surgery",
        "acute_injury",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            safe_weekly_rate: default_safe_weekly_rate(),
            max_heart_rate_fraction: default_max_heart_rate_fraction(),
            max_intensity_increase: default_max_intensity_increase(),
            min_goal_words: default_min_goal_words(),
            pace_deny_terms: default_pace_deny_terms(),
            high_risk_conditions: default_high_risk_conditions(),
        }
    }
}

/// Vocabulary the router scans for when deciding escalation and
/// specialist handoffs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPolicy {
    /// Phrases that always escalate with high urgency
    #[serde(default = "default_crisis_terms")]
    pub crisis_terms: Vec<String>,

    /// Phrases that route to the injury support capability
    #[serde(default = "default_injury_terms")]
    pub injury_terms: Vec<String>,

    /// Consecutive unusable turns before escalating to a human
    #[serde(default = "default_max_failed_clarifications")]
    pub max_failed_clarifications: u32,
}

fn default_crisis_terms() -> Vec<String> {
    [
        "chest pain",
        "can't breathe",
        "cannot breathe",
        "severe pain",
        "passed out",
        "fainted",
        "suicidal",
        "hurt myself",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_injury_terms() -> Vec<String> {
    ["injury", "injured", "sprain", "strain", "pulled a muscle", "sore knee", "hurts when"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_failed_clarifications() -> u32 {
    3
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            crisis_terms: default_crisis_terms(),
            injury_terms: default_injury_terms(),
            max_failed_clarifications: default_max_failed_clarifications(),
        }
    }
}

/// Retry defaults applied to tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}
