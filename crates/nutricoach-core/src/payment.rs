//! Telegram payment confirmations.
//!
//! The bot forwards every `successful_payment` update. Invoices carry a
//! payload of the form `pay:sub:<days>` or `pay:labs`; the provider charge id
//! makes the confirmation idempotent.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{UserId, MAX_GRANT_DAYS};

/// Credits granted by one `pay:labs` invoice.
const LABS_PACK_SIZE: i64 = 1;

/// A confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payer.
    pub user_id: UserId,
    /// Raw invoice payload.
    pub payload: String,
    /// ISO currency, upper case.
    pub currency: String,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    /// Provider charge id; unique per real payment.
    pub provider_charge_id: String,
}

/// What an invoice payload buys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentPayload {
    /// Subscription days.
    Subscription {
        /// Days to add.
        days: i64,
    },
    /// Lab analysis credits.
    LabsCredits {
        /// Credits to add.
        quantity: i64,
    },
    /// Unrecognised payload; recorded without effect.
    Other,
}

impl FromStr for PaymentPayload {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(days) = s.strip_prefix("pay:sub:") {
            let days = days
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=MAX_GRANT_DAYS).contains(days))
                .ok_or_else(|| CoreError::InvalidPaymentPayload(s.to_string()))?;
            return Ok(Self::Subscription { days });
        }
        if s.starts_with("pay:labs") {
            return Ok(Self::LabsCredits {
                quantity: LABS_PACK_SIZE,
            });
        }
        Ok(Self::Other)
    }
}

/// Effect applied by a recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentEffect {
    /// Subscription extended.
    Subscription {
        /// Days added.
        days: i64,
        /// New subscription end.
        expires_at: DateTime<Utc>,
    },
    /// Credits granted.
    LabsCredits {
        /// Credits added.
        quantity: i64,
        /// Balance after the grant.
        balance: i64,
    },
    /// Nothing granted.
    None,
}

/// Result of recording a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// First time this charge was seen; the effect was applied.
    Applied {
        /// What was granted.
        effect: PaymentEffect,
    },
    /// The charge was already recorded.
    Duplicate,
}
