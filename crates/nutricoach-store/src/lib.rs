//! Storage layer for NutriCoach.
//!
//! This crate provides persistent storage for subscriptions, credits,
//! referrals, promo codes, challenges, achievements and payments.
//!
//! # Backends
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`. Every multi-step mutation runs in a
//!   single transaction, and counters are changed with conditional updates so
//!   concurrent requests for the same user cannot lose updates.
//! - [`MemoryStore`]: a process-local backend for tests and local development.
//!   Each operation holds one async mutex for its whole duration.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use nutricoach_core::UserId;
//! use nutricoach_store::{PgStore, Store};
//!
//! # async fn run() -> nutricoach_store::Result<()> {
//! let store = PgStore::connect("postgres://localhost/nutricoach", 10, 5).await?;
//! store.migrate().await?;
//!
//! let user = UserId::new(42);
//! store.ensure_user(user, None).await?;
//! store.extend_subscription(user, 30, Utc::now()).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use nutricoach_core::{
    Achievement, Challenge, ChallengeKind, Handle, Payment, PaymentOutcome, PromoOutcome,
    Promocode, PromocodeTerms, RefCode, Referral, ReferralOutcome, StreakOutcome, Subscription,
    UserId, WeightEntry,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer so handlers receive an injected
/// handle instead of a process-wide connection. Every method is atomic with
/// respect to concurrent callers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    async fn ping(&self) -> Result<()>;

    // =========================================================================
    // Entitlements
    // =========================================================================

    /// Create the user's rows if absent and refresh the stored handle.
    ///
    /// Creates a subscription row, a zero credit balance and a referral record
    /// with a fresh unique code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn ensure_user(&self, user_id: UserId, handle: Option<&Handle>) -> Result<()>;

    /// Get a user's subscription row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn subscription(&self, user_id: UserId) -> Result<Option<Subscription>>;

    /// Grant the trial once.
    ///
    /// Sets `free_until = now + duration` only if no trial was ever granted and
    /// returns the new end; returns `None` when a trial already exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` for a negative duration or an end
    /// out of range, or an error if the database operation fails.
    async fn grant_trial(
        &self,
        user_id: UserId,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Add `days` to the paid subscription, keeping any unused time.
    ///
    /// Returns the new `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` for negative `days` or an end date
    /// out of range.
    async fn extend_subscription(
        &self,
        user_id: UserId,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>>;

    /// Mark the one free lab analysis as used.
    ///
    /// Returns `true` only for the call that flipped the flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn use_free_lab(&self, user_id: UserId) -> Result<bool>;

    /// Current lab credit balance (0 when the user has no row).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn credits(&self, user_id: UserId) -> Result<i64>;

    /// Add `amount` credits and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` for a negative amount or a balance
    /// that would overflow.
    async fn grant_credits(&self, user_id: UserId, amount: i64) -> Result<i64>;

    /// Take one credit if the balance is positive.
    ///
    /// Returns `false` without any mutation when the balance is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn consume_credit(&self, user_id: UserId) -> Result<bool>;

    /// Whether the user may use gated features at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn has_access(
        &self,
        user_id: UserId,
        handle: Option<&Handle>,
        admin: Option<&Handle>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let subscription = self.subscription(user_id).await?;
        Ok(nutricoach_core::has_access(
            subscription.as_ref(),
            handle,
            admin,
            now,
        ))
    }

    // =========================================================================
    // Referral / Promo Ledger
    // =========================================================================

    /// Get a user's referral record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn referral(&self, user_id: UserId) -> Result<Option<Referral>>;

    /// Credit the owner of `code` for inviting `invited`.
    ///
    /// The activation row, the inviter's counter and the inviter's bonus days
    /// are committed together or not at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn redeem_referral(
        &self,
        code: &RefCode,
        invited: UserId,
        now: DateTime<Utc>,
    ) -> Result<ReferralOutcome>;

    /// Create or replace a promo code's terms. `used_count` is preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert_promocode(&self, terms: &PromocodeTerms) -> Result<Promocode>;

    /// Redeem a promo code for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn redeem_promo(
        &self,
        code: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<PromoOutcome>;

    // =========================================================================
    // Streaks
    // =========================================================================

    /// Start a challenge if not already started. Returns `true` when created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn start_challenge(
        &self,
        user_id: UserId,
        kind: ChallengeKind,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Record progress for `today` (a UTC calendar date).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn log_progress(
        &self,
        user_id: UserId,
        kind: ChallengeKind,
        today: NaiveDate,
    ) -> Result<StreakOutcome>;

    /// All challenges of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn challenges(&self, user_id: UserId) -> Result<Vec<Challenge>>;

    /// All achievements of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn achievements(&self, user_id: UserId) -> Result<Vec<Achievement>>;

    // =========================================================================
    // Payments
    // =========================================================================

    /// Record a confirmed payment and apply what it bought, exactly once per
    /// provider charge id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if the payload cannot be parsed or
    /// its effect is out of range; the charge is then not recorded.
    async fn record_payment(&self, payment: &Payment, now: DateTime<Utc>)
        -> Result<PaymentOutcome>;

    // =========================================================================
    // Weight tracking
    // =========================================================================

    /// Record a weigh-in.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if the weight is out of range.
    async fn add_weight(&self, user_id: UserId, weight: f64, now: DateTime<Utc>)
        -> Result<WeightEntry>;

    /// Weigh-ins recorded at or after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn weight_history(&self, user_id: UserId, since: DateTime<Utc>)
        -> Result<Vec<WeightEntry>>;
}

pub(crate) fn trial_end(duration: Duration, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if duration < Duration::zero() {
        return Err(StoreError::InvalidInput("trial must not be negative".into()));
    }
    now.checked_add_signed(duration)
        .ok_or_else(|| StoreError::InvalidInput("trial end out of range".into()))
}

pub(crate) fn check_non_negative(what: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(StoreError::InvalidInput(format!(
            "{what} must not be negative, got {value}"
        )));
    }
    Ok(())
}
