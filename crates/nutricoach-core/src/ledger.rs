//! Referral and promo code ledger types.
//!
//! Both flows are "apply at most once" relationships. Their results are
//! explicit outcomes that callers render to users, not errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{RefCode, UserId, MAX_GRANT_DAYS};

/// Subscription days granted to an inviter per activated referral.
pub const REFERRAL_BONUS_DAYS: i64 = 7;

/// A user's referral record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    /// Owner of the code.
    pub user_id: UserId,
    /// Unique code used in invite links.
    pub ref_code: RefCode,
    /// Number of activated invitations.
    pub invited_count: i64,
}

/// Result of redeeming a referral code for a newly invited user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReferralOutcome {
    /// The inviter received the bonus.
    Applied {
        /// Who gets credit for the invitation.
        inviter: UserId,
        /// The inviter's new subscription end.
        inviter_expires_at: DateTime<Utc>,
    },
    /// The user tried to redeem their own code.
    SelfReferral,
    /// The invited user already activated a referral (any inviter).
    AlreadyActivated,
    /// No referral record carries this code.
    UnknownCode,
}

/// A promo code with its usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promocode {
    /// The code itself.
    pub code: String,
    /// Subscription days granted.
    pub days: i64,
    /// Lab credits granted.
    pub labs_credits: i64,
    /// Maximum number of redemptions; `None` is unlimited.
    pub max_uses: Option<i64>,
    /// Redemptions so far.
    pub used_count: i64,
    /// Last instant the code can be redeemed; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Promocode {
    /// Check whether the code can be redeemed at `now`.
    ///
    /// Returns the rejection outcome, or `None` when redemption may proceed.
    #[must_use]
    pub fn rejection(&self, now: DateTime<Utc>) -> Option<PromoOutcome> {
        if self.expires_at.is_some_and(|exp| exp < now) {
            return Some(PromoOutcome::Expired);
        }
        if self.max_uses.is_some_and(|max| self.used_count >= max) {
            return Some(PromoOutcome::Exhausted);
        }
        if self.days <= 0 && self.labs_credits <= 0 {
            return Some(PromoOutcome::Empty);
        }
        None
    }

    /// The outcome reported when the code is applied.
    #[must_use]
    pub fn applied(&self) -> PromoOutcome {
        PromoOutcome::Applied {
            days: self.days.max(0),
            credits: self.labs_credits.max(0),
        }
    }
}

/// Terms used to create or replace a promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromocodeTerms {
    /// The code itself.
    pub code: String,
    /// Subscription days granted.
    #[serde(default)]
    pub days: i64,
    /// Lab credits granted.
    #[serde(default)]
    pub labs_credits: i64,
    /// Maximum number of redemptions.
    #[serde(default)]
    pub max_uses: Option<i64>,
    /// Expiry of the code.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PromocodeTerms {
    /// Validate and normalise the terms.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidPromocode` for a blank code, any negative
    /// amount or more than [`MAX_GRANT_DAYS`] days.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        self.code = self.code.trim().to_string();
        if self.code.is_empty() {
            return Err(CoreError::InvalidPromocode("code must not be empty".into()));
        }
        if self.days < 0 || self.labs_credits < 0 {
            return Err(CoreError::InvalidPromocode(
                "days and labs_credits must not be negative".into(),
            ));
        }
        if self.days > MAX_GRANT_DAYS {
            return Err(CoreError::InvalidPromocode(format!(
                "days must be at most {MAX_GRANT_DAYS}"
            )));
        }
        if self.max_uses.is_some_and(|max| max < 0) {
            return Err(CoreError::InvalidPromocode(
                "max_uses must not be negative".into(),
            ));
        }
        Ok(self)
    }
}

/// Result of redeeming a promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromoOutcome {
    /// Benefits granted.
    Applied {
        /// Subscription days added.
        days: i64,
        /// Lab credits added.
        credits: i64,
    },
    /// No such code.
    NotFound,
    /// The code's expiry has passed.
    Expired,
    /// The code reached its usage limit.
    Exhausted,
    /// The code grants nothing.
    Empty,
}
