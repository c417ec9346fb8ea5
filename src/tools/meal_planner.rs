//! Meal planning tool: builds a week of meals around goals and preferences.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::adapters::CompletionService;
use crate::core::guardrails::GuardrailEngine;
use crate::domain::{ChangeOp, ChangeSet, DayMeals, MealPlan, SessionRecord};

use super::{Tool, ToolError, ToolKind, ToolOutput, ToolParams};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Calorie targets are clamped into this band regardless of goal math
const MIN_CALORIES: u32 = 1200;
const MAX_CALORIES: u32 = 4000;

const DAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// (name, ingredients, kcal)
type MealChoice = (&'static str, &'static [&'static str], f64);

const BREAKFASTS: &[MealChoice] = &[
    ("oatmeal with berries", &["rolled oats", "blueberries", "milk"], 350.0),
    ("greek yogurt and granola", &["greek yogurt", "granola", "honey"], 400.0),
    ("scrambled eggs on toast", &["eggs", "wholegrain bread", "butter"], 420.0),
    ("tofu scramble", &["tofu", "spinach", "wholegrain bread"], 380.0),
];

const LUNCHES: &[MealChoice] = &[
    ("grilled chicken salad", &["chicken breast", "mixed greens", "olive oil"], 520.0),
    ("lentil soup with bread", &["lentils", "carrots", "wholegrain bread"], 480.0),
    ("tuna wrap", &["tuna", "tortilla", "lettuce"], 500.0),
    ("chickpea bowl", &["chickpeas", "brown rice", "cucumber"], 510.0),
];

const DINNERS: &[MealChoice] = &[
    ("salmon with roast vegetables", &["salmon", "broccoli", "sweet potato"], 600.0),
    ("turkey stir fry", &["turkey", "bell peppers", "brown rice"], 580.0),
    ("vegetable curry", &["mixed vegetables", "coconut milk", "rice"], 550.0),
    ("bean chili", &["kidney beans", "tomatoes", "rice"], 560.0),
];

const SNACKS: &[MealChoice] = &[
    ("apple with peanut butter", &["apple", "peanut butter"], 200.0),
    ("handful of almonds", &["almonds"], 170.0),
    ("carrot sticks and hummus", &["carrots", "hummus"], 150.0),
];

/// Ingredient words excluded per restriction tag
fn excluded_ingredients(restriction: &str) -> &'static [&'static str] {
    match restriction {
        "vegetarian" => &["chicken breast", "tuna", "salmon", "turkey"],
        "vegan" => &[
            "chicken breast",
            "tuna",
            "salmon",
            "turkey",
            "eggs",
            "milk",
            "greek yogurt",
            "butter",
            "honey",
        ],
        "dairy-free" | "dairy free" => &["milk", "greek yogurt", "butter"],
        "gluten-free" | "gluten free" => &["wholegrain bread", "granola", "tortilla"],
        _ => &[],
    }
}

/// Generates personalized weekly meal plans
pub struct MealPlanner {
    completion: Arc<dyn CompletionService>,
}

impl MealPlanner {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    fn calories_target(record: &SessionRecord) -> u32 {
        // Maintenance estimate from weight, adjusted by the active goal
        let base = record
            .profile
            .weight_kg
            .map(|w| (w * 30.0) as i64)
            .unwrap_or(2200);

        let adjustment = match record.active_goal().map(|g| g.goal_type.as_str()) {
            Some("weight_loss") => -500,
            Some("muscle_gain") => 300,
            _ => 0,
        };

        ((base + adjustment).max(MIN_CALORIES as i64) as u32).min(MAX_CALORIES)
    }

    fn is_allowed(meal: &MealChoice, excluded: &[&str], allergies: &[String]) -> bool {
        let blocked = meal.1.iter().any(|ing| {
            excluded.contains(ing) || allergies.iter().any(|a| ing.contains(a.as_str()))
        });
        !blocked
    }

    fn pick<'a>(
        choices: &'a [MealChoice],
        excluded: &[&str],
        allergies: &[String],
        day_index: usize,
    ) -> &'a MealChoice {
        let allowed: Vec<&MealChoice> = choices
            .iter()
            .filter(|m| Self::is_allowed(m, excluded, allergies))
            .collect();
        if allowed.is_empty() {
            // Nothing survives the filters; fall back to the least
            // restricted option rather than an empty day.
            &choices[day_index % choices.len()]
        } else {
            allowed[day_index % allowed.len()]
        }
    }
}

#[async_trait]
impl Tool for MealPlanner {
    fn kind(&self) -> ToolKind {
        ToolKind::MealPlanner
    }

    fn validate_input(&self, params: &ToolParams) -> Result<(), ToolError> {
        for field in ["dietary_restrictions", "allergies", "preferences"] {
            if params.field(field).is_none() {
                return Err(ToolError::InvalidInput(format!("missing {}", field)));
            }
        }
        Ok(())
    }

    async fn pre_execute(
        &self,
        mut params: ToolParams,
        record: &SessionRecord,
        _guardrails: &GuardrailEngine,
    ) -> Result<ToolParams, ToolError> {
        let calories = Self::calories_target(record);
        params
            .fields
            .insert("calories_target".to_string(), calories.to_string());
        Ok(params)
    }

    async fn execute(
        &self,
        params: &ToolParams,
        record: &SessionRecord,
    ) -> Result<ToolOutput, ToolError> {
        let calories = params
            .numeric_field("calories_target")
            .unwrap_or(2200.0) as u32;

        let restrictions: Vec<String> = params
            .field("dietary_restrictions")
            .unwrap_or("none")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != "none")
            .collect();
        let allergies: Vec<String> = params
            .field("allergies")
            .unwrap_or("none")
            .split(&[',', ' '][..])
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != "none" && s != "and")
            .collect();

        let excluded: Vec<&str> = restrictions
            .iter()
            .flat_map(|r| excluded_ingredients(r).iter().copied())
            .collect();

        let mut daily_plans = Vec::with_capacity(7);
        let mut all_ingredients: Vec<&str> = Vec::new();
        let mut total_kcal = 0.0;

        for (i, day) in DAYS.iter().enumerate() {
            let breakfast = Self::pick(BREAKFASTS, &excluded, &allergies, i);
            let lunch = Self::pick(LUNCHES, &excluded, &allergies, i);
            let dinner = Self::pick(DINNERS, &excluded, &allergies, i);
            let snack = Self::pick(SNACKS, &excluded, &allergies, i);

            for meal in [breakfast, lunch, dinner, snack] {
                all_ingredients.extend_from_slice(meal.1);
                total_kcal += meal.2;
            }

            daily_plans.push(DayMeals {
                day: day.to_string(),
                breakfast: breakfast.0.to_string(),
                lunch: lunch.0.to_string(),
                dinner: dinner.0.to_string(),
                snacks: vec![snack.0.to_string()],
            });
        }

        all_ingredients.sort_unstable();
        all_ingredients.dedup();
        let shopping_list: Vec<String> =
            all_ingredients.into_iter().map(|s| s.to_string()).collect();

        let mut nutritional_summary = HashMap::new();
        nutritional_summary.insert("average_daily_kcal".to_string(), total_kcal / 7.0);

        let prompt = format!(
            "One sentence of meal-prep advice for a {} kcal plan with restrictions: {}.",
            calories,
            if restrictions.is_empty() {
                "none".to_string()
            } else {
                restrictions.join(", ")
            }
        );
        let advice = self.completion.complete(&prompt, COMPLETION_TIMEOUT).await?;

        let plan = MealPlan {
            id: Uuid::new_v4(),
            goal_id: record.active_goal().map(|g| g.id),
            calories_target: calories,
            daily_plans,
            shopping_list,
            nutritional_summary,
            created_at: Utc::now(),
            superseded_at: None,
        };

        let payload = json!({
            "plan_id": plan.id,
            "calories_target": plan.calories_target,
            "days": plan.daily_plans.len(),
            "shopping_list": plan.shopping_list,
        });

        let text = format!(
            "Here's your weekly meal plan around {} kcal/day. {}",
            calories, advice
        );

        Ok(ToolOutput {
            text,
            payload,
            changes: ChangeSet::single(ChangeOp::SetMealPlan(plan)),
        })
    }

    fn post_execute(&self, mut output: ToolOutput) -> ToolOutput {
        output.text = output.text.trim().to_string();
        output
    }
}
