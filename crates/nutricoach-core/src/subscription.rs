//! Subscription and trial entitlements.
//!
//! A user has access while either the paid subscription (`expires_at`) or the
//! trial window (`free_until`) lies in the future. Neither timestamp is ever
//! swept: expiry is evaluated lazily against the caller's `now`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Handle, UserId};

/// Default trial length granted on the first `/start`.
pub const DEFAULT_TRIAL_HOURS: i64 = 24;

/// Upper bound on the days a single payment or promo code may grant.
pub const MAX_GRANT_DAYS: i64 = 3650;

/// Per-user subscription state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Owner of the subscription.
    pub user_id: UserId,

    /// Last handle seen for this user (normalised).
    pub username: Option<Handle>,

    /// End of the paid subscription, if one was ever bought or granted.
    pub expires_at: Option<DateTime<Utc>>,

    /// End of the free trial, once granted.
    pub free_until: Option<DateTime<Utc>>,

    /// Whether the one free lab analysis has been used.
    pub used_free_lab: bool,
}

impl Subscription {
    /// A fresh row with nothing granted.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            username: None,
            expires_at: None,
            free_until: None,
            used_free_lab: false,
        }
    }

    /// Evaluate the subscription at `now`. A paid subscription wins over a trial.
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> AccessStatus {
        if self.expires_at.is_some_and(|exp| now < exp) {
            AccessStatus::Active
        } else if self.free_until.is_some_and(|free| now < free) {
            AccessStatus::Trial
        } else {
            AccessStatus::Expired
        }
    }

    /// Whether the subscription alone grants access at `now`.
    #[must_use]
    pub fn grants_access(&self, now: DateTime<Utc>) -> bool {
        self.status(now) != AccessStatus::Expired
    }
}

/// Access status reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    /// Paid subscription is running.
    Active,
    /// Only the trial window is running.
    Trial,
    /// Nothing is running.
    Expired,
}

/// Compute the new subscription end when adding `days`.
///
/// Unused time is kept: if `current` is still in the future the days are added
/// on top of it, otherwise the new period starts at `now`. The result is never
/// earlier than `current` for non-negative `days`.
///
/// Returns `None` when the new end is not representable.
#[must_use]
pub fn extend_expiry(
    current: Option<DateTime<Utc>>,
    days: i64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let base = match current {
        Some(exp) if exp > now => exp,
        _ => now,
    };
    Duration::try_days(days).and_then(|delta| base.checked_add_signed(delta))
}

/// Decide whether a user may use gated features.
///
/// The configured admin handle bypasses every entitlement check. A missing
/// admin handle never matches.
#[must_use]
pub fn has_access(
    subscription: Option<&Subscription>,
    handle: Option<&Handle>,
    admin: Option<&Handle>,
    now: DateTime<Utc>,
) -> bool {
    if let (Some(handle), Some(admin)) = (handle, admin) {
        if handle == admin {
            return true;
        }
    }
    subscription.is_some_and(|sub| sub.grants_access(now))
}
