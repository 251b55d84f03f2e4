//! Promo code redemption from the Mini-App.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use nutricoach_core::{PromoOutcome, UserId};
use nutricoach_store::Store;

use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Redemption request.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// The code, case-sensitive; surrounding whitespace is ignored.
    pub code: String,
}

/// Redeem `code` for `user_id`, shared by the Mini-App and bot routes.
pub(crate) async fn redeem(
    store: &dyn Store,
    user_id: UserId,
    code: &str,
) -> Result<PromoOutcome, ApiError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ApiError::BadRequest("code must not be empty".into()));
    }

    let outcome = store.redeem_promo(code, user_id, Utc::now()).await?;
    tracing::info!(%user_id, code, ?outcome, "Promo code redemption");
    Ok(outcome)
}

/// Redeem a promo code.
pub async fn redeem_promo(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<PromoOutcome>, ApiError> {
    redeem(state.store.as_ref(), user.user_id, &request.code)
        .await
        .map(Json)
}
