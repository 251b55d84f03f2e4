//! Database schema definitions.
//!
//! The DDL lives in `migrations/` and is embedded at compile time; this module
//! names the tables the queries refer to.

/// Table names.
pub mod table {
    /// Subscription and trial state, keyed by `user_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Lab analysis credits, keyed by `user_id`.
    pub const CREDITS: &str = "credits";

    /// Referral codes and invite counters, keyed by `user_id`.
    pub const REFERRALS: &str = "referrals";

    /// One row per invited user, keyed by `invited_id`.
    pub const REFERRAL_ACTIVATIONS: &str = "referral_activations";

    /// Promo codes, keyed by `code`.
    pub const PROMOCODES: &str = "promocodes";

    /// Challenge progress, keyed by `(user_id, challenge_type)`.
    pub const CHALLENGES: &str = "challenges";

    /// Daily challenge logs, keyed by `(user_id, challenge_type, log_date)`.
    pub const CHALLENGE_LOGS: &str = "challenge_logs";

    /// Awarded badges, keyed by `(user_id, badge)`.
    pub const ACHIEVEMENTS: &str = "achievements";

    /// Confirmed payments, keyed by `provider_charge_id`.
    pub const PAYMENTS: &str = "payments";

    /// Weigh-ins, one row per entry.
    pub const WEIGHT_TRACKING: &str = "weight_tracking";
}

/// Returns all table names, in creation order.
#[must_use]
pub fn all_tables() -> Vec<&'static str> {
    vec![
        table::SUBSCRIPTIONS,
        table::CREDITS,
        table::REFERRALS,
        table::REFERRAL_ACTIVATIONS,
        table::PROMOCODES,
        table::CHALLENGES,
        table::CHALLENGE_LOGS,
        table::ACHIEVEMENTS,
        table::PAYMENTS,
        table::WEIGHT_TRACKING,
    ]
}

/// Embedded migrations, run by `PgStore::migrate`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
