//! Challenge handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use nutricoach_core::{Challenge, ChallengeKind, StreakOutcome, CHALLENGE_COMPLETION_DAYS};

use crate::auth::TmaUser;
use crate::error::ApiError;
use crate::state::AppState;

/// A started challenge.
#[derive(Debug, Serialize)]
pub struct ChallengeView {
    /// Identifier, e.g. `water_challenge`.
    pub challenge_type: ChallengeKind,
    /// Display name.
    pub name: &'static str,
    /// When it was started.
    pub start_date: DateTime<Utc>,
    /// Days logged.
    pub progress: i32,
    /// Days needed to complete.
    pub target: i32,
    /// Whether it is complete.
    pub completed: bool,
}

impl From<Challenge> for ChallengeView {
    fn from(challenge: Challenge) -> Self {
        Self {
            challenge_type: challenge.kind,
            name: challenge.kind.display_name(),
            start_date: challenge.start_date,
            progress: challenge.progress,
            target: CHALLENGE_COMPLETION_DAYS,
            completed: challenge.completed,
        }
    }
}

/// A challenge that can still be started.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    /// Identifier.
    pub challenge_type: ChallengeKind,
    /// Display name.
    pub name: &'static str,
}

/// Challenge list response.
#[derive(Debug, Serialize)]
pub struct ChallengesResponse {
    /// Started challenges, oldest first.
    pub active: Vec<ChallengeView>,
    /// Catalog entries the user has not started.
    pub available: Vec<CatalogEntry>,
}

/// Response to starting a challenge.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    /// Identifier.
    pub challenge_type: ChallengeKind,
    /// `false` if it was already running.
    pub started: bool,
}

fn parse_kind(raw: &str) -> Result<ChallengeKind, ApiError> {
    Ok(raw.parse::<ChallengeKind>()?)
}

/// List started and available challenges.
pub async fn list_challenges(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
) -> Result<Json<ChallengesResponse>, ApiError> {
    let started = state.store.challenges(user.user_id).await?;
    let available = ChallengeKind::ALL
        .into_iter()
        .filter(|kind| !started.iter().any(|c| c.kind == *kind))
        .map(|kind| CatalogEntry {
            challenge_type: kind,
            name: kind.display_name(),
        })
        .collect();

    Ok(Json(ChallengesResponse {
        active: started.into_iter().map(Into::into).collect(),
        available,
    }))
}

/// Start a challenge. Starting twice is a no-op.
pub async fn start_challenge(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Path(challenge_type): Path<String>,
) -> Result<Json<StartResponse>, ApiError> {
    let kind = parse_kind(&challenge_type)?;
    let started = state
        .store
        .start_challenge(user.user_id, kind, Utc::now())
        .await?;
    if started {
        tracing::info!(user_id = %user.user_id, challenge = %kind, "Challenge started");
    }

    Ok(Json(StartResponse {
        challenge_type: kind,
        started,
    }))
}

/// Log today's progress (UTC calendar day).
pub async fn log_progress(
    State(state): State<Arc<AppState>>,
    user: TmaUser,
    Path(challenge_type): Path<String>,
) -> Result<Json<StreakOutcome>, ApiError> {
    let kind = parse_kind(&challenge_type)?;
    let today = Utc::now().date_naive();
    let outcome = state.store.log_progress(user.user_id, kind, today).await?;

    if let StreakOutcome::Logged {
        badge: Some(badge), ..
    } = &outcome
    {
        tracing::info!(user_id = %user.user_id, challenge = %kind, badge = %badge, "Challenge completed");
    }

    Ok(Json(outcome))
}
