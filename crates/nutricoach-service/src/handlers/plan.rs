//! Personal meal plans and recipes.
//!
//! Both require an active subscription or trial. The calorie target is
//! computed locally and handed to the model with the client's data.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use nutricoach_core::PlanInputs;

use crate::ai::{AiClient, Completion, PLAN_SYSTEM_PROMPT, RECIPE_SYSTEM_PROMPT};
use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

const MAX_NOTE_CHARS: usize = 500;
const MIN_PRODUCTS_CHARS: usize = 3;
const MAX_PRODUCTS_CHARS: usize = 2000;

/// Meal plan response.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    /// Recommended daily calories.
    pub daily_calories: i64,
    /// Model output.
    pub plan: String,
    /// Model that answered.
    pub model: String,
}

fn plan_prompt(inputs: &PlanInputs, daily_calories: i64) -> String {
    format!(
        "Write a personal 7-day meal plan (breakfast, lunch, dinner, snacks) with \
         approximate portion weights and daily calories. Keep it structured.\n\n\
         Client:\n\
         - Age: {}\n\
         - Sex: {:?}\n\
         - Weight: {} kg\n\
         - Height: {} cm\n\
         - Activity: {}\n\
         - Goal: {}\n\
         - Preferences: {}\n\
         - Restrictions: {}\n\
         - Recommended intake: {daily_calories} kcal/day",
        inputs.age,
        inputs.sex,
        inputs.weight,
        inputs.height,
        inputs.activity,
        inputs.goal,
        inputs.preferences,
        inputs.restrictions,
    )
}

fn check_note(name: &str, value: &str) -> Result<(), ApiError> {
    if value.chars().count() > MAX_NOTE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "{name} must be at most {MAX_NOTE_CHARS} characters"
        )));
    }
    Ok(())
}

fn ai_client(state: &AppState) -> Result<&AiClient, ApiError> {
    state
        .ai
        .as_deref()
        .ok_or_else(|| ApiError::Unavailable("AI is not configured".into()))
}

/// Generate a seven-day meal plan.
pub async fn generate_plan(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Json(inputs): Json<PlanInputs>,
) -> Result<Json<PlanResponse>, ApiError> {
    let inputs = inputs.validated()?;
    for (name, value) in [
        ("activity", &inputs.activity),
        ("goal", &inputs.goal),
        ("preferences", &inputs.preferences),
        ("restrictions", &inputs.restrictions),
    ] {
        check_note(name, value)?;
    }

    user.require_access(&state).await?;
    let ai = ai_client(&state)?;

    let daily_calories = inputs.daily_calories();
    tracing::info!(user_id = %user.user_id, daily_calories, "Generating meal plan");

    match ai
        .complete(PLAN_SYSTEM_PROMPT, &plan_prompt(&inputs, daily_calories), 0.4)
        .await
    {
        Completion::Text { model, text } => Ok(Json(PlanResponse {
            daily_calories,
            plan: text,
            model,
        })),
        Completion::Unavailable => Err(ApiError::Unavailable(
            "AI is temporarily unavailable".into(),
        )),
    }
}

/// Recipe request.
#[derive(Debug, Deserialize)]
pub struct RecipeRequest {
    /// Products on hand, free text.
    pub products: String,
}

/// Recipe response.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    /// Model output.
    pub recipes: String,
    /// Model that answered.
    pub model: String,
}

/// Suggest three recipes from a list of products.
pub async fn generate_recipes(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Json(request): Json<RecipeRequest>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let products = request.products.trim();
    let len = products.chars().count();
    if !(MIN_PRODUCTS_CHARS..=MAX_PRODUCTS_CHARS).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "products must be between {MIN_PRODUCTS_CHARS} and {MAX_PRODUCTS_CHARS} characters"
        )));
    }

    user.require_access(&state).await?;
    let ai = ai_client(&state)?;

    let prompt = format!(
        "Suggest 3 recipes using these products. For each give the name, ingredients \
         with weights, cooking steps, and calories, protein, fat and carbs per serving.\n\n\
         Products:\n{products}"
    );
    match ai.complete(RECIPE_SYSTEM_PROMPT, &prompt, 0.5).await {
        Completion::Text { model, text } => Ok(Json(RecipeResponse {
            recipes: text,
            model,
        })),
        Completion::Unavailable => Err(ApiError::Unavailable(
            "AI is temporarily unavailable".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutricoach_core::Sex;

    #[test]
    fn plan_prompt_carries_client_data_and_target() {
        let inputs = PlanInputs {
            age: 30,
            sex: Sex::Female,
            weight: 65.5,
            height: 170.0,
            activity: "light".into(),
            goal: "lose".into(),
            preferences: "fish".into(),
            restrictions: "no nuts".into(),
        };
        let prompt = plan_prompt(&inputs, 1620);
        assert!(prompt.contains("Weight: 65.5 kg"));
        assert!(prompt.contains("Sex: Female"));
        assert!(prompt.contains("Restrictions: no nuts"));
        assert!(prompt.contains("1620 kcal/day"));
    }
}
