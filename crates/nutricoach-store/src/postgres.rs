//! PostgreSQL storage implementation.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};

use nutricoach_core::{
    extend_expiry, validate_weight, Achievement, Challenge, ChallengeKind, Handle, Payment, PaymentEffect,
    PaymentOutcome, PaymentPayload, PromoOutcome, Promocode, PromocodeTerms, RefCode, Referral,
    ReferralOutcome, StreakOutcome, Subscription, UserId, WeightEntry,
    CHALLENGE_COMPLETION_DAYS, REFERRAL_BONUS_DAYS,
};

use crate::error::{Result, StoreError};
use crate::schema::MIGRATOR;
use crate::{check_non_negative, trial_end, Store};

const REF_CODE_ATTEMPTS: usize = 3;
const INITIAL_BACKOFF: StdDuration = StdDuration::from_millis(500);

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with bounded retry.
    ///
    /// Makes up to `attempts` connection attempts, doubling the delay between
    /// them starting at 500ms.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once all attempts are spent.
    pub async fn connect(url: &str, max_connections: u32, attempts: u32) -> Result<Self> {
        let attempts = attempts.max(1);
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;

        loop {
            let result = PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(StdDuration::from_secs(10))
                .connect(url)
                .await;

            match result {
                Ok(pool) => {
                    info!(max_connections, "Connected to PostgreSQL");
                    return Ok(Self { pool });
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        attempt,
                        attempts,
                        error = %e,
                        "PostgreSQL connection failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    user_id: i64,
    username: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    free_until: Option<DateTime<Utc>>,
    used_free_lab: bool,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            username: Handle::parse_opt(row.username.as_deref()),
            expires_at: row.expires_at,
            free_until: row.free_until,
            used_free_lab: row.used_free_lab,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReferralRow {
    user_id: i64,
    ref_code: String,
    invited_count: i64,
}

impl TryFrom<ReferralRow> for Referral {
    type Error = StoreError;

    fn try_from(row: ReferralRow) -> Result<Self> {
        let ref_code = RefCode::parse(&row.ref_code).ok_or_else(|| {
            StoreError::Serialization(format!("invalid stored ref code: {}", row.ref_code))
        })?;
        Ok(Self {
            user_id: UserId::new(row.user_id),
            ref_code,
            invited_count: row.invited_count,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PromocodeRow {
    code: String,
    days: i64,
    labs_credits: i64,
    max_uses: Option<i64>,
    used_count: i64,
    expires_at: Option<DateTime<Utc>>,
}

impl From<PromocodeRow> for Promocode {
    fn from(row: PromocodeRow) -> Self {
        Self {
            code: row.code,
            days: row.days,
            labs_credits: row.labs_credits,
            max_uses: row.max_uses,
            used_count: row.used_count,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChallengeRow {
    user_id: i64,
    challenge_type: String,
    start_date: DateTime<Utc>,
    progress: i32,
    completed: bool,
}

impl TryFrom<ChallengeRow> for Challenge {
    type Error = StoreError;

    fn try_from(row: ChallengeRow) -> Result<Self> {
        let kind = row
            .challenge_type
            .parse::<ChallengeKind>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            user_id: UserId::new(row.user_id),
            kind,
            start_date: row.start_date,
            progress: row.progress,
            completed: row.completed,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AchievementRow {
    user_id: i64,
    badge: String,
    ts: DateTime<Utc>,
}

impl From<AchievementRow> for Achievement {
    fn from(row: AchievementRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            badge: row.badge,
            awarded_at: row.ts,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WeightRow {
    weight: f64,
    ts: DateTime<Utc>,
}

impl From<WeightRow> for WeightEntry {
    fn from(row: WeightRow) -> Self {
        Self {
            weight: row.weight,
            recorded_at: row.ts,
        }
    }
}

// =============================================================================
// Shared steps (run inside a caller's transaction)
// =============================================================================

async fn extend_in(
    conn: &mut PgConnection,
    user_id: UserId,
    days: i64,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    sqlx::query("INSERT INTO subscriptions (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id.get())
        .execute(&mut *conn)
        .await?;

    let current: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT expires_at FROM subscriptions WHERE user_id = $1 FOR UPDATE")
            .bind(user_id.get())
            .fetch_one(&mut *conn)
            .await?;

    let expires_at = extend_expiry(current, days, now).ok_or_else(|| {
        StoreError::InvalidInput(format!("extending by {days} days is out of range"))
    })?;
    sqlx::query("UPDATE subscriptions SET expires_at = $2 WHERE user_id = $1")
        .bind(user_id.get())
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;

    Ok(expires_at)
}

async fn grant_in(conn: &mut PgConnection, user_id: UserId, amount: i64) -> Result<i64> {
    // The guard skips the update instead of raising `bigint out of range`.
    let balance: Option<i64> = sqlx::query_scalar(
        r"
        INSERT INTO credits (user_id, labs_credits)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
            SET labs_credits = credits.labs_credits + EXCLUDED.labs_credits
            WHERE credits.labs_credits <= 9223372036854775807 - EXCLUDED.labs_credits
        RETURNING labs_credits
        ",
    )
    .bind(user_id.get())
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;
    balance.ok_or_else(|| StoreError::InvalidInput("credit balance out of range".into()))
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_user(&self, user_id: UserId, handle: Option<&Handle>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO subscriptions (user_id, username)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET username = EXCLUDED.username
            ",
        )
        .bind(user_id.get())
        .bind(handle.map(Handle::as_str))
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO credits (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id.get())
            .execute(&mut *tx)
            .await?;

        let mut has_referral = false;
        for _ in 0..REF_CODE_ATTEMPTS {
            // A clash on ref_code or user_id both leave the insert a no-op.
            sqlx::query(
                "INSERT INTO referrals (user_id, ref_code) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id.get())
            .bind(RefCode::generate().as_str())
            .execute(&mut *tx)
            .await?;

            has_referral = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM referrals WHERE user_id = $1)",
            )
            .bind(user_id.get())
            .fetch_one(&mut *tx)
            .await?;
            if has_referral {
                break;
            }
            debug!(%user_id, "Referral code collision, regenerating");
        }
        if !has_referral {
            return Err(StoreError::Database(format!(
                "could not allocate a unique referral code for user {user_id}"
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn subscription(&self, user_id: UserId) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r"
            SELECT user_id, username, expires_at, free_until, used_free_lab
            FROM subscriptions
            WHERE user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn grant_trial(
        &self,
        user_id: UserId,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let until = trial_end(duration, now)?;
        let granted: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            r"
            INSERT INTO subscriptions (user_id, free_until)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
                SET free_until = EXCLUDED.free_until
                WHERE subscriptions.free_until IS NULL
            RETURNING free_until
            ",
        )
        .bind(user_id.get())
        .bind(until)
        .fetch_optional(&self.pool)
        .await?;
        Ok(granted.flatten())
    }

    async fn extend_subscription(
        &self,
        user_id: UserId,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        check_non_negative("days", days)?;
        let mut tx = self.pool.begin().await?;
        let expires_at = extend_in(&mut *tx, user_id, days, now).await?;
        tx.commit().await?;
        Ok(expires_at)
    }

    async fn use_free_lab(&self, user_id: UserId) -> Result<bool> {
        let flipped: Option<bool> = sqlx::query_scalar(
            r"
            INSERT INTO subscriptions (user_id, used_free_lab)
            VALUES ($1, TRUE)
            ON CONFLICT (user_id) DO UPDATE
                SET used_free_lab = TRUE
                WHERE subscriptions.used_free_lab = FALSE
            RETURNING used_free_lab
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(flipped.is_some())
    }

    async fn credits(&self, user_id: UserId) -> Result<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT labs_credits FROM credits WHERE user_id = $1")
                .bind(user_id.get())
                .fetch_optional(&self.pool)
                .await?;
        Ok(balance.unwrap_or(0))
    }

    async fn grant_credits(&self, user_id: UserId, amount: i64) -> Result<i64> {
        check_non_negative("credits", amount)?;
        let mut conn = self.pool.acquire().await?;
        grant_in(&mut *conn, user_id, amount).await
    }

    async fn consume_credit(&self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE credits
            SET labs_credits = labs_credits - 1
            WHERE user_id = $1 AND labs_credits > 0
            ",
        )
        .bind(user_id.get())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn referral(&self, user_id: UserId) -> Result<Option<Referral>> {
        let row = sqlx::query_as::<_, ReferralRow>(
            "SELECT user_id, ref_code, invited_count FROM referrals WHERE user_id = $1",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn redeem_referral(
        &self,
        code: &RefCode,
        invited: UserId,
        now: DateTime<Utc>,
    ) -> Result<ReferralOutcome> {
        let mut tx = self.pool.begin().await?;

        let inviter: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM referrals WHERE ref_code = $1 FOR UPDATE")
                .bind(code.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(inviter) = inviter.map(UserId::new) else {
            return Ok(ReferralOutcome::UnknownCode);
        };
        if inviter == invited {
            return Ok(ReferralOutcome::SelfReferral);
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO referral_activations (invited_id, inviter_id, activated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (invited_id) DO NOTHING
            ",
        )
        .bind(invited.get())
        .bind(inviter.get())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(ReferralOutcome::AlreadyActivated);
        }

        sqlx::query("UPDATE referrals SET invited_count = invited_count + 1 WHERE user_id = $1")
            .bind(inviter.get())
            .execute(&mut *tx)
            .await?;
        let inviter_expires_at = extend_in(&mut *tx, inviter, REFERRAL_BONUS_DAYS, now).await?;

        tx.commit().await?;
        Ok(ReferralOutcome::Applied {
            inviter,
            inviter_expires_at,
        })
    }

    async fn upsert_promocode(&self, terms: &PromocodeTerms) -> Result<Promocode> {
        let row = sqlx::query_as::<_, PromocodeRow>(
            r"
            INSERT INTO promocodes (code, days, labs_credits, max_uses, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO UPDATE SET
                days = EXCLUDED.days,
                labs_credits = EXCLUDED.labs_credits,
                max_uses = EXCLUDED.max_uses,
                expires_at = EXCLUDED.expires_at
            RETURNING code, days, labs_credits, max_uses, used_count, expires_at
            ",
        )
        .bind(&terms.code)
        .bind(terms.days)
        .bind(terms.labs_credits)
        .bind(terms.max_uses)
        .bind(terms.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn redeem_promo(
        &self,
        code: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<PromoOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PromocodeRow>(
            r"
            SELECT code, days, labs_credits, max_uses, used_count, expires_at
            FROM promocodes
            WHERE code = $1
            FOR UPDATE
            ",
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(promo) = row.map(Promocode::from) else {
            return Ok(PromoOutcome::NotFound);
        };
        if let Some(rejection) = promo.rejection(now) {
            return Ok(rejection);
        }

        if promo.days > 0 {
            extend_in(&mut *tx, user_id, promo.days, now).await?;
        }
        if promo.labs_credits > 0 {
            grant_in(&mut *tx, user_id, promo.labs_credits).await?;
        }
        sqlx::query("UPDATE promocodes SET used_count = used_count + 1 WHERE code = $1")
            .bind(code)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(promo.applied())
    }

    async fn start_challenge(
        &self,
        user_id: UserId,
        kind: ChallengeKind,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO challenges (user_id, challenge_type, start_date)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, challenge_type) DO NOTHING
            ",
        )
        .bind(user_id.get())
        .bind(kind.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn log_progress(
        &self,
        user_id: UserId,
        kind: ChallengeKind,
        today: NaiveDate,
    ) -> Result<StreakOutcome> {
        let mut tx = self.pool.begin().await?;

        let completed: Option<bool> = sqlx::query_scalar(
            r"
            SELECT completed FROM challenges
            WHERE user_id = $1 AND challenge_type = $2
            FOR UPDATE
            ",
        )
        .bind(user_id.get())
        .bind(kind.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(was_completed) = completed else {
            return Ok(StreakOutcome::NotStarted);
        };

        let logged = sqlx::query(
            r"
            INSERT INTO challenge_logs (user_id, challenge_type, log_date)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(user_id.get())
        .bind(kind.as_str())
        .bind(today)
        .execute(&mut *tx)
        .await?;
        if logged.rows_affected() == 0 {
            return Ok(StreakOutcome::AlreadyLoggedToday);
        }

        let progress: i32 = sqlx::query_scalar(
            r"
            UPDATE challenges SET progress = progress + 1
            WHERE user_id = $1 AND challenge_type = $2
            RETURNING progress
            ",
        )
        .bind(user_id.get())
        .bind(kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut badge = None;
        if progress >= CHALLENGE_COMPLETION_DAYS && !was_completed {
            sqlx::query(
                "UPDATE challenges SET completed = TRUE WHERE user_id = $1 AND challenge_type = $2",
            )
            .bind(user_id.get())
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;

            let name = kind.badge();
            sqlx::query(
                "INSERT INTO achievements (user_id, badge, ts) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(user_id.get())
            .bind(&name)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
            badge = Some(name);
        }

        tx.commit().await?;
        Ok(StreakOutcome::Logged {
            progress,
            completed: was_completed || badge.is_some(),
            badge,
        })
    }

    async fn challenges(&self, user_id: UserId) -> Result<Vec<Challenge>> {
        let rows = sqlx::query_as::<_, ChallengeRow>(
            r"
            SELECT user_id, challenge_type, start_date, progress, completed
            FROM challenges
            WHERE user_id = $1
            ORDER BY start_date, challenge_type
            ",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn achievements(&self, user_id: UserId) -> Result<Vec<Achievement>> {
        let rows = sqlx::query_as::<_, AchievementRow>(
            "SELECT user_id, badge, ts FROM achievements WHERE user_id = $1 ORDER BY ts DESC",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_payment(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let payload: PaymentPayload = payment.payload.parse()?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO payments (provider_charge_id, user_id, payload, currency, amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (provider_charge_id) DO NOTHING
            ",
        )
        .bind(&payment.provider_charge_id)
        .bind(payment.user_id.get())
        .bind(&payment.payload)
        .bind(&payment.currency)
        .bind(payment.amount)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(PaymentOutcome::Duplicate);
        }

        let effect = match payload {
            PaymentPayload::Subscription { days } => PaymentEffect::Subscription {
                days,
                expires_at: extend_in(&mut *tx, payment.user_id, days, now).await?,
            },
            PaymentPayload::LabsCredits { quantity } => PaymentEffect::LabsCredits {
                quantity,
                balance: grant_in(&mut *tx, payment.user_id, quantity).await?,
            },
            PaymentPayload::Other => PaymentEffect::None,
        };

        tx.commit().await?;
        Ok(PaymentOutcome::Applied { effect })
    }

    async fn add_weight(
        &self,
        user_id: UserId,
        weight: f64,
        now: DateTime<Utc>,
    ) -> Result<WeightEntry> {
        let weight = validate_weight(weight)?;
        sqlx::query("INSERT INTO weight_tracking (user_id, weight, ts) VALUES ($1, $2, $3)")
            .bind(user_id.get())
            .bind(weight)
            .bind(now)
            .execute(&self.pool)
            .await?;
        debug!(%user_id, weight, "Recorded weight");
        Ok(WeightEntry {
            weight,
            recorded_at: now,
        })
    }

    async fn weight_history(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<WeightEntry>> {
        let rows = sqlx::query_as::<_, WeightRow>(
            r"
            SELECT weight, ts
            FROM weight_tracking
            WHERE user_id = $1 AND ts >= $2
            ORDER BY ts DESC, id DESC
            ",
        )
        .bind(user_id.get())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
