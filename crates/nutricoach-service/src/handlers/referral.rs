//! Referral handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use nutricoach_core::{RefCode, REFERRAL_BONUS_DAYS};

use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Referral program status.
#[derive(Debug, Serialize)]
pub struct ReferralResponse {
    /// Code to share.
    pub ref_code: RefCode,
    /// Friends who joined with the code.
    pub invited_count: i64,
    /// Days earned per invited friend.
    pub bonus_days: i64,
}

/// Get the user's referral code and invite count.
pub async fn get_referral(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
) -> Result<Json<ReferralResponse>, ApiError> {
    state
        .store
        .ensure_user(user.user_id, user.handle.as_ref())
        .await?;
    let referral = state
        .store
        .referral(user.user_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("no referral row for {}", user.user_id)))?;

    Ok(Json(ReferralResponse {
        ref_code: referral.ref_code,
        invited_count: referral.invited_count,
        bonus_days: REFERRAL_BONUS_DAYS,
    }))
}
