//! Body weight tracking.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;

use nutricoach_core::{WeightEntry, WeightHistory};

use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_DAYS: i64 = 30;
const MAX_HISTORY_DAYS: i64 = 365;

/// Weigh-in request.
#[derive(Debug, Deserialize)]
pub struct AddWeightRequest {
    /// Weight in kilograms.
    pub weight: f64,
}

/// Record a weigh-in for now.
pub async fn add_weight(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Json(request): Json<AddWeightRequest>,
) -> Result<Json<WeightEntry>, ApiError> {
    let entry = state
        .store
        .add_weight(user.user_id, request.weight, Utc::now())
        .await?;
    Ok(Json(entry))
}

/// History window.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Days to look back, 1 to 365. Defaults to 30.
    pub days: Option<i64>,
}

/// Weigh-ins over the last `days` days, newest first, with a summary.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<WeightHistory>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_HISTORY_DAYS}"
        )));
    }

    let since = Utc::now() - Duration::days(days);
    let entries = state.store.weight_history(user.user_id, since).await?;
    Ok(Json(WeightHistory::from_entries(entries)))
}
