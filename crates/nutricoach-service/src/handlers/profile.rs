//! Profile handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use nutricoach_core::{AccessStatus, RefCode, UserId};

use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Everything the Mini-App home screen shows.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// Telegram user id.
    pub user_id: UserId,
    /// Handle without the leading `@`.
    pub username: Option<String>,
    /// First name from Telegram.
    pub first_name: Option<String>,
    /// Subscription state right now.
    pub status: AccessStatus,
    /// Whether gated features are available.
    pub has_access: bool,
    /// Whether this user is the admin.
    pub is_admin: bool,
    /// Paid subscription end.
    pub expires_at: Option<DateTime<Utc>>,
    /// Trial end.
    pub free_until: Option<DateTime<Utc>>,
    /// Whether the free lab analysis is still available.
    pub free_lab_available: bool,
    /// Lab analysis credits.
    pub labs_credits: i64,
    /// Number of badges earned.
    pub achievements: usize,
    /// Number of started, unfinished challenges.
    pub active_challenges: usize,
    /// Code to share in invite links.
    pub ref_code: Option<RefCode>,
    /// Friends who joined with the code.
    pub invited_count: i64,
}

/// Get the current user's profile, creating their rows on first visit.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let now = Utc::now();
    let store = &state.store;
    store.ensure_user(user.user_id, user.handle.as_ref()).await?;

    let subscription = store.subscription(user.user_id).await?;
    let is_admin = user.is_admin(&state);
    let has_access = store
        .has_access(
            user.user_id,
            user.handle.as_ref(),
            state.config.admin_handle.as_ref(),
            now,
        )
        .await?;
    let labs_credits = store.credits(user.user_id).await?;
    let achievements = store.achievements(user.user_id).await?.len();
    let active_challenges = store
        .challenges(user.user_id)
        .await?
        .iter()
        .filter(|c| !c.completed)
        .count();
    let referral = store.referral(user.user_id).await?;

    Ok(Json(ProfileResponse {
        user_id: user.user_id,
        username: user.handle.as_ref().map(|h| h.as_str().to_string()),
        first_name: user.identity.first_name.clone(),
        status: subscription
            .as_ref()
            .map_or(AccessStatus::Expired, |s| s.status(now)),
        has_access,
        is_admin,
        expires_at: subscription.as_ref().and_then(|s| s.expires_at),
        free_until: subscription.as_ref().and_then(|s| s.free_until),
        free_lab_available: !subscription.as_ref().is_some_and(|s| s.used_free_lab),
        labs_credits,
        achievements,
        active_challenges,
        invited_count: referral.as_ref().map_or(0, |r| r.invited_count),
        ref_code: referral.map(|r| r.ref_code),
    }))
}
