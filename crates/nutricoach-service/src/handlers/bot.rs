//! Routes called by the bot process.
//!
//! The bot handles Telegram updates and forwards the state-changing parts
//! here, authenticated with the shared service key.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nutricoach_core::{
    Handle, Payment, PaymentOutcome, PromoOutcome, RefCode, ReferralOutcome, UserId,
};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::handlers::promo;
use crate::state::AppState;

/// `/start` request.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Telegram user id.
    pub user_id: UserId,
    /// Telegram username, if any.
    #[serde(default)]
    pub username: Option<String>,
    /// Deep-link payload, the inviter's referral code.
    #[serde(default)]
    pub ref_code: Option<String>,
}

/// `/start` response.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    /// Whether the user is the admin.
    pub is_admin: bool,
    /// The user's own referral code.
    pub ref_code: Option<RefCode>,
    /// Outcome of the deep-link referral, when one was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<ReferralOutcome>,
    /// End of a trial granted by this call.
    pub trial_until: Option<DateTime<Utc>>,
}

/// Register a user, apply a referral and grant the trial.
pub async fn start(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let now = Utc::now();
    let user_id = request.user_id;
    let handle = Handle::parse_opt(request.username.as_deref());
    state.store.ensure_user(user_id, handle.as_ref()).await?;

    let mut referral = None;
    if let Some(code) = request.ref_code.as_deref().and_then(RefCode::parse) {
        let outcome = state.store.redeem_referral(&code, user_id, now).await?;
        if let ReferralOutcome::Applied { inviter, .. } = &outcome {
            tracing::info!(%inviter, invited = %user_id, "Referral applied");
            if let Some(notifier) = &state.notifier {
                notifier.referral_bonus(*inviter);
            }
        } else {
            tracing::debug!(invited = %user_id, ?outcome, "Referral not applied");
        }
        referral = Some(outcome);
    }

    let is_admin = state.config.is_admin(handle.as_ref());
    let trial_until = if is_admin {
        None
    } else {
        state
            .store
            .grant_trial(user_id, state.config.trial_duration(), now)
            .await?
    };
    if let Some(until) = trial_until {
        tracing::info!(%user_id, %until, "Trial granted");
    }

    Ok(Json(StartResponse {
        is_admin,
        ref_code: state.store.referral(user_id).await?.map(|r| r.ref_code),
        referral,
        trial_until,
    }))
}

/// Bot promo request.
#[derive(Debug, Deserialize)]
pub struct PromoRequest {
    /// Telegram user id.
    pub user_id: UserId,
    /// The code.
    pub code: String,
}

/// Redeem a promo code sent to the bot.
pub async fn redeem_promo(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(request): Json<PromoRequest>,
) -> Result<Json<PromoOutcome>, ApiError> {
    promo::redeem(state.store.as_ref(), request.user_id, &request.code)
        .await
        .map(Json)
}

/// Confirmed payment forwarded by the bot.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    /// Payer.
    pub user_id: UserId,
    /// Invoice payload, e.g. `pay:sub:30` or `pay:labs`.
    pub payload: String,
    /// ISO currency code.
    pub currency: String,
    /// Amount in the currency's smallest unit.
    pub amount: i64,
    /// Provider charge id; the idempotency key.
    pub provider_charge_id: String,
}

/// Record a payment and apply what it bought.
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentOutcome>, ApiError> {
    let provider_charge_id = request.provider_charge_id.trim().to_string();
    if provider_charge_id.is_empty() {
        return Err(ApiError::BadRequest(
            "provider_charge_id must not be empty".into(),
        ));
    }

    let payment = Payment {
        user_id: request.user_id,
        payload: request.payload.trim().to_string(),
        currency: request.currency.trim().to_uppercase(),
        amount: request.amount,
        provider_charge_id,
    };
    let outcome = state.store.record_payment(&payment, Utc::now()).await?;

    tracing::info!(
        user_id = %payment.user_id,
        payload = %payment.payload,
        currency = %payment.currency,
        amount = payment.amount,
        ?outcome,
        "Payment recorded"
    );

    Ok(Json(outcome))
}
