//! Admin handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use nutricoach_core::{Promocode, PromocodeTerms};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Create or replace a promo code. The usage counter survives replacement.
pub async fn upsert_promocode(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(terms): Json<PromocodeTerms>,
) -> Result<Json<Promocode>, ApiError> {
    let terms = terms.validated()?;
    let promo = state.store.upsert_promocode(&terms).await?;

    tracing::info!(
        admin = %admin.user_id,
        code = %promo.code,
        days = promo.days,
        labs_credits = promo.labs_credits,
        max_uses = ?promo.max_uses,
        expires_at = ?promo.expires_at,
        "Promo code saved"
    );

    Ok(Json(promo))
}
