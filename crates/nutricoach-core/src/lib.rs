//! Core types for the NutriCoach backend.
//!
//! This crate provides the domain model shared by the storage layer and the
//! HTTP service:
//!
//! - **Identifiers**: `UserId`, `Handle`, `RefCode`
//! - **Entitlements**: `Subscription`, `AccessStatus`, `has_access`
//! - **Ledger**: `Referral`, `ReferralOutcome`, `Promocode`, `PromoOutcome`
//! - **Streaks**: `ChallengeKind`, `Challenge`, `StreakOutcome`, `Achievement`
//! - **Payments**: `Payment`, `PaymentPayload`, `PaymentOutcome`
//! - **Nutrition**: `WeightEntry`, `WeightHistory`, `PlanInputs`
//!
//! Every state transition that needs a clock takes `now` explicitly so that
//! storage backends and tests agree on a single instant per operation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod challenge;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod nutrition;
pub mod payment;
pub mod subscription;

pub use challenge::{
    achievement_description, Achievement, Challenge, ChallengeKind, StreakOutcome,
    CHALLENGE_COMPLETION_DAYS,
};
pub use error::{CoreError, Result};
pub use ids::{Handle, RefCode, UserId};
pub use ledger::{
    Promocode, PromocodeTerms, PromoOutcome, Referral, ReferralOutcome, REFERRAL_BONUS_DAYS,
};
pub use nutrition::{validate_weight, PlanInputs, Sex, WeightEntry, WeightHistory};
pub use payment::{Payment, PaymentEffect, PaymentOutcome, PaymentPayload};
pub use subscription::{
    extend_expiry, has_access, AccessStatus, Subscription, DEFAULT_TRIAL_HOURS, MAX_GRANT_DAYS,
};
