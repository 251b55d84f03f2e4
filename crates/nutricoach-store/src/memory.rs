//! In-memory storage implementation.
//!
//! Used by the service's integration tests and when no `DATABASE_URL` is
//! configured. Every operation takes the single mutex for its full duration,
//! which gives the same all-or-nothing behaviour as a database transaction.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use nutricoach_core::{
    extend_expiry, validate_weight, Achievement, Challenge, ChallengeKind, Handle, Payment, PaymentEffect,
    PaymentOutcome, PaymentPayload, PromoOutcome, Promocode, PromocodeTerms, RefCode, Referral,
    ReferralOutcome, StreakOutcome, Subscription, UserId, WeightEntry,
    CHALLENGE_COMPLETION_DAYS, REFERRAL_BONUS_DAYS,
};

use crate::error::{Result, StoreError};
use crate::{check_non_negative, trial_end, Store};

/// Process-local storage backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    subscriptions: HashMap<UserId, Subscription>,
    credits: HashMap<UserId, i64>,
    referrals: HashMap<UserId, Referral>,
    // invited -> inviter
    activations: HashMap<UserId, UserId>,
    promocodes: HashMap<String, Promocode>,
    challenges: HashMap<(UserId, ChallengeKind), Challenge>,
    challenge_logs: HashSet<(UserId, ChallengeKind, NaiveDate)>,
    achievements: HashMap<(UserId, String), Achievement>,
    payments: HashMap<String, Payment>,
    // insertion order
    weights: HashMap<UserId, Vec<WeightEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn subscription_mut(&mut self, user_id: UserId) -> &mut Subscription {
        self.subscriptions
            .entry(user_id)
            .or_insert_with(|| Subscription::new(user_id))
    }

    // Effects are computed before anything is written, so a rejected
    // operation leaves every table untouched.
    fn next_expiry(&self, user_id: UserId, days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let current = self.subscriptions.get(&user_id).and_then(|s| s.expires_at);
        extend_expiry(current, days, now).ok_or_else(|| {
            StoreError::InvalidInput(format!("extending by {days} days is out of range"))
        })
    }

    fn next_balance(&self, user_id: UserId, amount: i64) -> Result<i64> {
        self.credits
            .get(&user_id)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| StoreError::InvalidInput("credit balance out of range".into()))
    }

    fn set_expiry(&mut self, user_id: UserId, expires_at: DateTime<Utc>) {
        self.subscription_mut(user_id).expires_at = Some(expires_at);
    }

    fn set_balance(&mut self, user_id: UserId, balance: i64) {
        self.credits.insert(user_id, balance);
    }

    fn extend(&mut self, user_id: UserId, days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let expires_at = self.next_expiry(user_id, days, now)?;
        self.set_expiry(user_id, expires_at);
        Ok(expires_at)
    }

    fn grant(&mut self, user_id: UserId, amount: i64) -> Result<i64> {
        let balance = self.next_balance(user_id, amount)?;
        self.set_balance(user_id, balance);
        Ok(balance)
    }

    fn ensure_referral(&mut self, user_id: UserId) {
        if self.referrals.contains_key(&user_id) {
            return;
        }
        let ref_code = loop {
            let candidate = RefCode::generate();
            if !self.referrals.values().any(|r| r.ref_code == candidate) {
                break candidate;
            }
        };
        self.referrals.insert(
            user_id,
            Referral {
                user_id,
                ref_code,
                invited_count: 0,
            },
        );
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_user(&self, user_id: UserId, handle: Option<&Handle>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.subscription_mut(user_id).username = handle.cloned();
        inner.credits.entry(user_id).or_insert(0);
        inner.ensure_referral(user_id);
        Ok(())
    }

    async fn subscription(&self, user_id: UserId) -> Result<Option<Subscription>> {
        Ok(self.inner.lock().await.subscriptions.get(&user_id).cloned())
    }

    async fn grant_trial(
        &self,
        user_id: UserId,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let until = trial_end(duration, now)?;
        let mut inner = self.inner.lock().await;
        let sub = inner.subscription_mut(user_id);
        if sub.free_until.is_some() {
            return Ok(None);
        }
        sub.free_until = Some(until);
        Ok(Some(until))
    }

    async fn extend_subscription(
        &self,
        user_id: UserId,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        check_non_negative("days", days)?;
        self.inner.lock().await.extend(user_id, days, now)
    }

    async fn use_free_lab(&self, user_id: UserId) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let sub = inner.subscription_mut(user_id);
        if sub.used_free_lab {
            return Ok(false);
        }
        sub.used_free_lab = true;
        Ok(true)
    }

    async fn credits(&self, user_id: UserId) -> Result<i64> {
        Ok(self
            .inner
            .lock()
            .await
            .credits
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn grant_credits(&self, user_id: UserId, amount: i64) -> Result<i64> {
        check_non_negative("credits", amount)?;
        self.inner.lock().await.grant(user_id, amount)
    }

    async fn consume_credit(&self, user_id: UserId) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.credits.get_mut(&user_id) {
            Some(balance) if *balance > 0 => {
                *balance -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn referral(&self, user_id: UserId) -> Result<Option<Referral>> {
        Ok(self.inner.lock().await.referrals.get(&user_id).cloned())
    }

    async fn redeem_referral(
        &self,
        code: &RefCode,
        invited: UserId,
        now: DateTime<Utc>,
    ) -> Result<ReferralOutcome> {
        let mut inner = self.inner.lock().await;

        let Some(inviter) = inner
            .referrals
            .values()
            .find(|r| &r.ref_code == code)
            .map(|r| r.user_id)
        else {
            return Ok(ReferralOutcome::UnknownCode);
        };
        if inviter == invited {
            return Ok(ReferralOutcome::SelfReferral);
        }
        if inner.activations.contains_key(&invited) {
            return Ok(ReferralOutcome::AlreadyActivated);
        }

        let inviter_expires_at = inner.next_expiry(inviter, REFERRAL_BONUS_DAYS, now)?;
        inner.activations.insert(invited, inviter);
        if let Some(referral) = inner.referrals.get_mut(&inviter) {
            referral.invited_count += 1;
        }
        inner.set_expiry(inviter, inviter_expires_at);

        Ok(ReferralOutcome::Applied {
            inviter,
            inviter_expires_at,
        })
    }

    async fn upsert_promocode(&self, terms: &PromocodeTerms) -> Result<Promocode> {
        let mut inner = self.inner.lock().await;
        let used_count = inner
            .promocodes
            .get(&terms.code)
            .map_or(0, |p| p.used_count);
        let promo = Promocode {
            code: terms.code.clone(),
            days: terms.days,
            labs_credits: terms.labs_credits,
            max_uses: terms.max_uses,
            used_count,
            expires_at: terms.expires_at,
        };
        inner.promocodes.insert(promo.code.clone(), promo.clone());
        Ok(promo)
    }

    async fn redeem_promo(
        &self,
        code: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<PromoOutcome> {
        let mut inner = self.inner.lock().await;

        let Some(promo) = inner.promocodes.get(code).cloned() else {
            return Ok(PromoOutcome::NotFound);
        };
        if let Some(rejection) = promo.rejection(now) {
            return Ok(rejection);
        }

        let expires_at = if promo.days > 0 {
            Some(inner.next_expiry(user_id, promo.days, now)?)
        } else {
            None
        };
        let balance = if promo.labs_credits > 0 {
            Some(inner.next_balance(user_id, promo.labs_credits)?)
        } else {
            None
        };

        if let Some(expires_at) = expires_at {
            inner.set_expiry(user_id, expires_at);
        }
        if let Some(balance) = balance {
            inner.set_balance(user_id, balance);
        }
        if let Some(stored) = inner.promocodes.get_mut(code) {
            stored.used_count += 1;
        }

        Ok(promo.applied())
    }

    async fn start_challenge(
        &self,
        user_id: UserId,
        kind: ChallengeKind,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.challenges.contains_key(&(user_id, kind)) {
            return Ok(false);
        }
        inner.challenges.insert(
            (user_id, kind),
            Challenge {
                user_id,
                kind,
                start_date: now,
                progress: 0,
                completed: false,
            },
        );
        Ok(true)
    }

    async fn log_progress(
        &self,
        user_id: UserId,
        kind: ChallengeKind,
        today: NaiveDate,
    ) -> Result<StreakOutcome> {
        let mut inner = self.inner.lock().await;

        if !inner.challenges.contains_key(&(user_id, kind)) {
            return Ok(StreakOutcome::NotStarted);
        }
        if !inner.challenge_logs.insert((user_id, kind, today)) {
            return Ok(StreakOutcome::AlreadyLoggedToday);
        }

        let Some(challenge) = inner.challenges.get_mut(&(user_id, kind)) else {
            return Ok(StreakOutcome::NotStarted);
        };
        challenge.progress += 1;
        let progress = challenge.progress;
        let newly_completed = progress >= CHALLENGE_COMPLETION_DAYS && !challenge.completed;
        if newly_completed {
            challenge.completed = true;
        }
        let completed = challenge.completed;

        let badge = if newly_completed {
            let badge = kind.badge();
            inner
                .achievements
                .entry((user_id, badge.clone()))
                .or_insert_with(|| Achievement {
                    user_id,
                    badge: badge.clone(),
                    awarded_at: Utc::now(),
                });
            Some(badge)
        } else {
            None
        };

        Ok(StreakOutcome::Logged {
            progress,
            completed,
            badge,
        })
    }

    async fn challenges(&self, user_id: UserId) -> Result<Vec<Challenge>> {
        let inner = self.inner.lock().await;
        let mut challenges: Vec<_> = inner
            .challenges
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        challenges.sort_by_key(|c| (c.start_date, c.kind.as_str()));
        Ok(challenges)
    }

    async fn achievements(&self, user_id: UserId) -> Result<Vec<Achievement>> {
        let inner = self.inner.lock().await;
        let mut achievements: Vec<_> = inner
            .achievements
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        achievements.sort_by(|a, b| b.awarded_at.cmp(&a.awarded_at));
        Ok(achievements)
    }

    async fn record_payment(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let payload: PaymentPayload = payment.payload.parse()?;
        let mut inner = self.inner.lock().await;

        if inner.payments.contains_key(&payment.provider_charge_id) {
            return Ok(PaymentOutcome::Duplicate);
        }

        // Apply first: a rejected effect must not record the charge.
        let effect = match payload {
            PaymentPayload::Subscription { days } => PaymentEffect::Subscription {
                days,
                expires_at: inner.extend(payment.user_id, days, now)?,
            },
            PaymentPayload::LabsCredits { quantity } => PaymentEffect::LabsCredits {
                quantity,
                balance: inner.grant(payment.user_id, quantity)?,
            },
            PaymentPayload::Other => PaymentEffect::None,
        };
        inner
            .payments
            .insert(payment.provider_charge_id.clone(), payment.clone());

        Ok(PaymentOutcome::Applied { effect })
    }

    async fn add_weight(
        &self,
        user_id: UserId,
        weight: f64,
        now: DateTime<Utc>,
    ) -> Result<WeightEntry> {
        let entry = WeightEntry {
            weight: validate_weight(weight)?,
            recorded_at: now,
        };
        let mut inner = self.inner.lock().await;
        inner.weights.entry(user_id).or_default().push(entry.clone());
        Ok(entry)
    }

    async fn weight_history(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<WeightEntry>> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<WeightEntry> = inner
            .weights
            .get(&user_id)
            .into_iter()
            .flatten()
            .rev()
            .filter(|e| e.recorded_at >= since)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }
}
