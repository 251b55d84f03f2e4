//! Free-text nutrition questions.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ai::{Completion, ASK_SYSTEM_PROMPT};
use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

const MAX_QUESTION_CHARS: usize = 2000;

/// Question request.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// The question.
    pub question: String,
}

/// Answer response.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    /// Model output.
    pub answer: String,
    /// Model that answered.
    pub model: String,
}

/// Ask a nutrition question. Requires an active subscription or trial.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".into()));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::BadRequest(format!(
            "question must be at most {MAX_QUESTION_CHARS} characters"
        )));
    }

    user.require_access(&state).await?;

    let ai = state
        .ai
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("AI is not configured".into()))?;

    match ai.complete(ASK_SYSTEM_PROMPT, question, 0.7).await {
        Completion::Text { model, text } => Ok(Json(AskResponse {
            answer: text,
            model,
        })),
        Completion::Unavailable => Err(ApiError::Unavailable(
            "AI is temporarily unavailable".into(),
        )),
    }
}
