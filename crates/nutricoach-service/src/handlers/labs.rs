//! Lab analysis handlers.
//!
//! Each analysis is paid for by exactly one of: admin exemption, the one-shot
//! free lab, or one credit. The charge happens before the model is called; a
//! credit is refunded when no model answers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use nutricoach_core::UserId;
use nutricoach_store::Store;

use crate::ai::{Completion, LABS_SYSTEM_PROMPT};
use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Maximum lab text accepted, in characters.
const MAX_LAB_TEXT_CHARS: usize = 8000;

/// Credit balance response.
#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    /// Paid lab analysis credits.
    pub labs_credits: i64,
    /// Whether the one-shot free analysis is still available.
    pub free_lab_available: bool,
}

/// Get the user's lab analysis allowance.
pub async fn get_credits(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
) -> Result<Json<CreditsResponse>, ApiError> {
    let labs_credits = state.store.credits(user.user_id).await?;
    let used_free_lab = state
        .store
        .subscription(user.user_id)
        .await?
        .is_some_and(|s| s.used_free_lab);

    Ok(Json(CreditsResponse {
        labs_credits,
        free_lab_available: !used_free_lab,
    }))
}

/// Lab analysis request.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Lab results as text.
    pub text: String,
}

/// How an analysis was paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Charge {
    /// Admin, nothing consumed.
    Admin,
    /// The one-shot free analysis.
    FreeLab,
    /// One paid credit.
    Credit,
}

/// Lab analysis response.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    /// Model output.
    pub analysis: String,
    /// Model that answered.
    pub model: String,
    /// What paid for this analysis.
    pub charged: Charge,
    /// Credits left afterwards.
    pub labs_credits: i64,
}

async fn charge(store: &dyn Store, user_id: UserId, is_admin: bool) -> Result<Charge, ApiError> {
    if is_admin {
        return Ok(Charge::Admin);
    }
    if store.use_free_lab(user_id).await? {
        return Ok(Charge::FreeLab);
    }
    if store.consume_credit(user_id).await? {
        return Ok(Charge::Credit);
    }
    Err(ApiError::InsufficientCredits {
        balance: store.credits(user_id).await?,
        required: 1,
    })
}

/// Analyze lab results.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".into()));
    }
    if text.chars().count() > MAX_LAB_TEXT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "text must be at most {MAX_LAB_TEXT_CHARS} characters"
        )));
    }
    let ai = state
        .ai
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("AI is not configured".into()))?;

    let charged = charge(state.store.as_ref(), user.user_id, user.is_admin(&state)).await?;
    tracing::info!(user_id = %user.user_id, ?charged, "Lab analysis charged");

    match ai.complete(LABS_SYSTEM_PROMPT, text, 0.3).await {
        Completion::Text { model, text } => Ok(Json(AnalyzeResponse {
            analysis: text,
            model,
            charged,
            labs_credits: state.store.credits(user.user_id).await?,
        })),
        Completion::Unavailable => {
            if charged == Charge::Credit {
                let balance = state.store.grant_credits(user.user_id, 1).await?;
                tracing::info!(user_id = %user.user_id, balance, "Refunded lab credit");
            }
            Err(ApiError::Unavailable(
                "AI is temporarily unavailable".into(),
            ))
        }
    }
}
