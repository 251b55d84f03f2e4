//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `TmaUser` - Mini-App users, via signed init data (`Authorization: tma ...`)
//! - `AdminUser` - a `TmaUser` whose handle is the configured admin
//! - `ServiceAuth` - the bot process, via `X-Api-Key`

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;

use nutricoach_core::{Handle, UserId};

use crate::error::ApiError;
use crate::init_data::{self, AuthError, TrustedIdentity};
use crate::state::AppState;

/// Authorization scheme used by the Mini-App.
const TMA_SCHEME: &str = "tma ";

/// A Mini-App user whose init data passed verification.
#[derive(Debug, Clone)]
pub struct TmaUser {
    /// Verified Telegram user id.
    pub user_id: UserId,
    /// Normalised handle, if the user has one.
    pub handle: Option<Handle>,
    /// Everything the payload carried.
    pub identity: TrustedIdentity,
}

impl TmaUser {
    /// Whether this user is the configured admin.
    #[must_use]
    pub fn is_admin(&self, state: &AppState) -> bool {
        state.config.is_admin(self.handle.as_ref())
    }

    /// Fail with 403 unless the user is the admin or has an active
    /// subscription or trial.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` without access, or a store error.
    pub async fn require_access(&self, state: &AppState) -> Result<(), ApiError> {
        let allowed = state
            .store
            .has_access(
                self.user_id,
                self.handle.as_ref(),
                state.config.admin_handle.as_ref(),
                Utc::now(),
            )
            .await?;
        if allowed {
            Ok(())
        } else {
            Err(ApiError::subscription_required())
        }
    }
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<TmaUser, ApiError> {
    let header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

    let init_data = header
        .strip_prefix(TMA_SCHEME)
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization format".into()))?;

    let identity = init_data::verify(init_data, &state.config.bot_secret).map_err(|e| {
        tracing::warn!(reason = %e, "Rejected init data");
        ApiError::from(e)
    })?;

    let user_id = identity.user_id.ok_or_else(|| {
        tracing::warn!("Verified init data without a user id");
        ApiError::from(AuthError::MalformedPayload)
    })?;

    Ok(TmaUser {
        user_id,
        handle: Handle::parse_opt(identity.username.as_deref()),
        identity,
    })
}

impl FromRequestParts<Arc<AppState>> for TmaUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move { authenticate(parts, state) })
    }
}

/// The configured admin, authenticated as a Mini-App user.
#[derive(Debug, Clone)]
pub struct AdminUser(pub TmaUser);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user = authenticate(parts, state)?;
            if !user.is_admin(state) {
                tracing::warn!(user_id = %user.user_id, "Non-admin attempted admin operation");
                return Err(ApiError::Forbidden("admin only".into()));
            }
            Ok(AdminUser(user))
        })
    }
}

/// The bot process, authenticated with the shared service key.
#[derive(Debug, Clone, Copy)]
pub struct ServiceAuth;

impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let api_key = parts
                .headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ApiError::Unauthorized("Missing API key".into()))?;

            // Without a configured key the bot routes stay closed.
            let expected_key = state
                .config
                .service_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Unauthorized("Invalid API key".into()))?;

            if !crate::crypto::constant_time_eq(api_key, expected_key) {
                tracing::warn!("Rejected service API key");
                return Err(ApiError::Unauthorized("Invalid API key".into()));
            }

            Ok(ServiceAuth)
        })
    }
}
