//! Achievement listing.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use nutricoach_core::achievement_description;

use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

/// An earned badge.
#[derive(Debug, Serialize)]
pub struct AchievementView {
    /// Badge name.
    pub badge: String,
    /// Short description.
    pub description: &'static str,
    /// When it was earned.
    pub awarded_at: DateTime<Utc>,
}

/// Achievement list response.
#[derive(Debug, Serialize)]
pub struct AchievementsResponse {
    /// Newest first.
    pub achievements: Vec<AchievementView>,
}

/// List the user's achievements.
pub async fn list_achievements(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
) -> Result<Json<AchievementsResponse>, ApiError> {
    let achievements = state
        .store
        .achievements(user.user_id)
        .await?
        .into_iter()
        .map(|a| AchievementView {
            description: achievement_description(&a.badge),
            badge: a.badge,
            awarded_at: a.awarded_at,
        })
        .collect();

    Ok(Json(AchievementsResponse { achievements }))
}
