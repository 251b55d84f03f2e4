//! Behaviour every `Store` backend must share.
//!
//! Each scenario takes a `base` id so the Postgres run can use fresh users on
//! a database that outlives the test process.

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use nutricoach_core::{
    ChallengeKind, Payment, PaymentEffect, PaymentOutcome, PromoOutcome, PromocodeTerms,
    ReferralOutcome, StreakOutcome, UserId, REFERRAL_BONUS_DAYS,
};
use nutricoach_store::{Store, StoreError};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()
}

fn day(offset: i64) -> NaiveDate {
    now().date_naive() + Duration::days(offset)
}

pub async fn extension_keeps_unused_time(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 1);
    store.ensure_user(user, None).await.unwrap();

    let first = store.extend_subscription(user, 30, now()).await.unwrap();
    assert_eq!(first, now() + Duration::days(30));

    let second = store
        .extend_subscription(user, 7, now() + Duration::days(10))
        .await
        .unwrap();
    assert_eq!(second, now() + Duration::days(37));

    // Lapsed subscriptions restart from the moment of extension.
    let later = now() + Duration::days(100);
    let third = store.extend_subscription(user, 1, later).await.unwrap();
    assert_eq!(third, later + Duration::days(1));

    assert!(store.has_access(user, None, None, later).await.unwrap());
    assert!(!store
        .has_access(user, None, None, later + Duration::days(2))
        .await
        .unwrap());
}

pub async fn trial_and_free_lab_are_one_shot(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 2);
    store.ensure_user(user, None).await.unwrap();

    let until = store
        .grant_trial(user, Duration::hours(24), now())
        .await
        .unwrap();
    assert_eq!(until, Some(now() + Duration::hours(24)));
    assert_eq!(
        store
            .grant_trial(user, Duration::hours(24), now() + Duration::days(5))
            .await
            .unwrap(),
        None
    );

    assert!(store.has_access(user, None, None, now()).await.unwrap());
    assert!(!store
        .has_access(user, None, None, now() + Duration::hours(25))
        .await
        .unwrap());

    assert!(store.use_free_lab(user).await.unwrap());
    assert!(!store.use_free_lab(user).await.unwrap());
    assert!(store.subscription(user).await.unwrap().unwrap().used_free_lab);
}

pub async fn credits_never_go_negative(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 3);
    store.ensure_user(user, None).await.unwrap();

    assert_eq!(store.credits(user).await.unwrap(), 0);
    assert!(!store.consume_credit(user).await.unwrap());

    assert_eq!(store.grant_credits(user, 2).await.unwrap(), 2);
    assert!(store.consume_credit(user).await.unwrap());
    assert!(store.consume_credit(user).await.unwrap());
    assert!(!store.consume_credit(user).await.unwrap());
    assert_eq!(store.credits(user).await.unwrap(), 0);
}

pub async fn referral_credits_inviter_once(store: &dyn Store, base: i64) {
    let inviter = UserId::new(base + 10);
    let invited = UserId::new(base + 11);
    store.ensure_user(inviter, None).await.unwrap();
    store.ensure_user(invited, None).await.unwrap();

    let code = store.referral(inviter).await.unwrap().unwrap().ref_code;

    let outcome = store.redeem_referral(&code, invited, now()).await.unwrap();
    assert_eq!(
        outcome,
        ReferralOutcome::Applied {
            inviter,
            inviter_expires_at: now() + Duration::days(REFERRAL_BONUS_DAYS),
        }
    );

    let again = store.redeem_referral(&code, invited, now()).await.unwrap();
    assert_eq!(again, ReferralOutcome::AlreadyActivated);

    let own = store.redeem_referral(&code, inviter, now()).await.unwrap();
    assert_eq!(own, ReferralOutcome::SelfReferral);

    let referral = store.referral(inviter).await.unwrap().unwrap();
    assert_eq!(referral.invited_count, 1);
    let sub = store.subscription(inviter).await.unwrap().unwrap();
    assert_eq!(
        sub.expires_at,
        Some(now() + Duration::days(REFERRAL_BONUS_DAYS))
    );
}

pub async fn promo_lifecycle(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 20);
    let other = UserId::new(base + 21);
    let code = format!("WELCOME{base}");
    store.ensure_user(user, None).await.unwrap();
    store.ensure_user(other, None).await.unwrap();

    let missing = store
        .redeem_promo(&format!("NOPE{base}"), user, now())
        .await
        .unwrap();
    assert_eq!(missing, PromoOutcome::NotFound);

    store
        .upsert_promocode(&PromocodeTerms {
            code: code.clone(),
            days: 3,
            labs_credits: 2,
            max_uses: Some(1),
            expires_at: Some(now() + Duration::days(1)),
        })
        .await
        .unwrap();

    let applied = store.redeem_promo(&code, user, now()).await.unwrap();
    assert_eq!(applied, PromoOutcome::Applied { days: 3, credits: 2 });
    assert_eq!(store.credits(user).await.unwrap(), 2);
    assert_eq!(
        store.subscription(user).await.unwrap().unwrap().expires_at,
        Some(now() + Duration::days(3))
    );

    let exhausted = store.redeem_promo(&code, other, now()).await.unwrap();
    assert_eq!(exhausted, PromoOutcome::Exhausted);

    // Replacing the terms keeps the usage counter.
    let updated = store
        .upsert_promocode(&PromocodeTerms {
            code: code.clone(),
            days: 1,
            labs_credits: 0,
            max_uses: Some(5),
            expires_at: Some(now() + Duration::days(1)),
        })
        .await
        .unwrap();
    assert_eq!(updated.used_count, 1);

    let expired = store
        .redeem_promo(&code, other, now() + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(expired, PromoOutcome::Expired);
}

pub async fn streak_completes_after_seven_days(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 30);
    store.ensure_user(user, None).await.unwrap();

    let before = store
        .log_progress(user, ChallengeKind::Water, day(0))
        .await
        .unwrap();
    assert_eq!(before, StreakOutcome::NotStarted);

    assert!(store
        .start_challenge(user, ChallengeKind::Water, now())
        .await
        .unwrap());
    assert!(!store
        .start_challenge(user, ChallengeKind::Water, now())
        .await
        .unwrap());

    for offset in 0..6 {
        let outcome = store
            .log_progress(user, ChallengeKind::Water, day(offset))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StreakOutcome::Logged {
                progress: i32::try_from(offset + 1).unwrap(),
                completed: false,
                badge: None,
            }
        );
    }

    let same_day = store
        .log_progress(user, ChallengeKind::Water, day(5))
        .await
        .unwrap();
    assert_eq!(same_day, StreakOutcome::AlreadyLoggedToday);

    let seventh = store
        .log_progress(user, ChallengeKind::Water, day(6))
        .await
        .unwrap();
    assert_eq!(
        seventh,
        StreakOutcome::Logged {
            progress: 7,
            completed: true,
            badge: Some(ChallengeKind::Water.badge()),
        }
    );

    // Logging past completion never awards the badge twice.
    let eighth = store
        .log_progress(user, ChallengeKind::Water, day(7))
        .await
        .unwrap();
    assert_eq!(
        eighth,
        StreakOutcome::Logged {
            progress: 8,
            completed: true,
            badge: None,
        }
    );

    let achievements = store.achievements(user).await.unwrap();
    assert_eq!(achievements.len(), 1);
    assert_eq!(achievements[0].badge, ChallengeKind::Water.badge());

    let challenges = store.challenges(user).await.unwrap();
    assert_eq!(challenges.len(), 1);
    assert!(challenges[0].completed);
}

pub async fn payments_apply_once(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 40);
    store.ensure_user(user, None).await.unwrap();

    let payment = Payment {
        user_id: user,
        payload: "pay:sub:30".to_string(),
        currency: "XTR".to_string(),
        amount: 500,
        provider_charge_id: format!("charge-{base}-sub"),
    };
    let first = store.record_payment(&payment, now()).await.unwrap();
    assert_eq!(
        first,
        PaymentOutcome::Applied {
            effect: PaymentEffect::Subscription {
                days: 30,
                expires_at: now() + Duration::days(30),
            }
        }
    );
    let replay = store.record_payment(&payment, now()).await.unwrap();
    assert_eq!(replay, PaymentOutcome::Duplicate);

    let labs = Payment {
        payload: "pay:labs".to_string(),
        provider_charge_id: format!("charge-{base}-labs"),
        ..payment.clone()
    };
    let granted = store.record_payment(&labs, now()).await.unwrap();
    assert_eq!(
        granted,
        PaymentOutcome::Applied {
            effect: PaymentEffect::LabsCredits {
                quantity: 1,
                balance: 1,
            }
        }
    );

    let bad = Payment {
        payload: "pay:sub:zero".to_string(),
        provider_charge_id: format!("charge-{base}-bad"),
        ..payment
    };
    assert!(store.record_payment(&bad, now()).await.is_err());
}

pub async fn out_of_range_grants_change_nothing(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 50);
    store.ensure_user(user, None).await.unwrap();

    // A subscription end past the calendar's range is rejected, and the
    // charge stays unrecorded so a retry can still apply it.
    let payment = Payment {
        user_id: user,
        payload: "pay:sub:30".to_string(),
        currency: "XTR".to_string(),
        amount: 500,
        provider_charge_id: format!("charge-{base}-edge"),
    };
    let near_end = DateTime::<Utc>::MAX_UTC - Duration::days(1);
    let err = store.record_payment(&payment, near_end).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert_eq!(store.subscription(user).await.unwrap().unwrap().expires_at, None);

    let retry = store.record_payment(&payment, now()).await.unwrap();
    assert!(matches!(retry, PaymentOutcome::Applied { .. }));

    // Promo terms written without validation still cannot overflow.
    let code = format!("HUGE{base}");
    store
        .upsert_promocode(&PromocodeTerms {
            code: code.clone(),
            days: 1_000_000_000_000,
            labs_credits: 1,
            max_uses: None,
            expires_at: None,
        })
        .await
        .unwrap();
    let before = store.subscription(user).await.unwrap().unwrap().expires_at;
    let err = store.redeem_promo(&code, user, now()).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert_eq!(
        store.subscription(user).await.unwrap().unwrap().expires_at,
        before
    );
    assert_eq!(store.credits(user).await.unwrap(), 0);
    let promo = store
        .upsert_promocode(&PromocodeTerms {
            code,
            days: 1,
            labs_credits: 0,
            max_uses: None,
            expires_at: None,
        })
        .await
        .unwrap();
    assert_eq!(promo.used_count, 0);
}

pub async fn credit_balance_cannot_overflow(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 51);
    store.ensure_user(user, None).await.unwrap();

    assert_eq!(store.grant_credits(user, i64::MAX).await.unwrap(), i64::MAX);
    let err = store.grant_credits(user, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert_eq!(store.credits(user).await.unwrap(), i64::MAX);

    let labs = Payment {
        user_id: user,
        payload: "pay:labs".to_string(),
        currency: "XTR".to_string(),
        amount: 100,
        provider_charge_id: format!("charge-{base}-overflow"),
    };
    assert!(store.record_payment(&labs, now()).await.is_err());
    assert_eq!(store.credits(user).await.unwrap(), i64::MAX);
}

pub async fn concurrent_promo_redemptions_respect_limit(store: &dyn Store, base: i64) {
    let code = format!("ONCE{base}");
    store
        .upsert_promocode(&PromocodeTerms {
            code: code.clone(),
            days: 0,
            labs_credits: 1,
            max_uses: Some(1),
            expires_at: None,
        })
        .await
        .unwrap();

    let users: Vec<UserId> = (0..8).map(|i| UserId::new(base + 60 + i)).collect();
    for user in &users {
        store.ensure_user(*user, None).await.unwrap();
    }

    let outcomes = futures::future::join_all(
        users
            .iter()
            .map(|user| store.redeem_promo(&code, *user, now())),
    )
    .await;

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(PromoOutcome::Applied { .. })))
        .count();
    let exhausted = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(PromoOutcome::Exhausted)))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(exhausted, users.len() - 1);

    let mut granted = 0;
    for user in &users {
        granted += store.credits(*user).await.unwrap();
    }
    assert_eq!(granted, 1);
}

pub async fn trial_end_must_be_representable(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 52);
    store.ensure_user(user, None).await.unwrap();

    let err = store
        .grant_trial(user, Duration::days(1_000_000_000), now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)), "{err}");
    let err = store
        .grant_trial(user, Duration::hours(-1), now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)), "{err}");

    // Rejected attempts do not use up the trial.
    let granted = store
        .grant_trial(user, Duration::hours(24), now())
        .await
        .unwrap();
    assert_eq!(granted, Some(now() + Duration::hours(24)));
}

pub async fn weight_history_is_newest_first(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 70);
    let other = UserId::new(base + 71);

    store
        .add_weight(user, 82.0, now() - Duration::days(40))
        .await
        .unwrap();
    store
        .add_weight(user, 80.5, now() - Duration::days(20))
        .await
        .unwrap();
    let latest = store
        .add_weight(user, 79.25, now() - Duration::days(1))
        .await
        .unwrap();
    assert_eq!(latest.recorded_at, now() - Duration::days(1));
    store.add_weight(other, 120.0, now()).await.unwrap();

    let history = store
        .weight_history(user, now() - Duration::days(30))
        .await
        .unwrap();
    let weights: Vec<f64> = history.iter().map(|e| e.weight).collect();
    assert_eq!(weights, vec![79.25, 80.5]);

    let everything = store
        .weight_history(user, now() - Duration::days(365))
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);
    assert!(store
        .weight_history(UserId::new(base + 72), now() - Duration::days(365))
        .await
        .unwrap()
        .is_empty());
}

pub async fn implausible_weight_is_rejected(store: &dyn Store, base: i64) {
    let user = UserId::new(base + 73);
    for weight in [0.0, 19.99, 300.5, f64::NAN] {
        let err = store.add_weight(user, weight, now()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)), "{weight}: {err}");
    }
    assert!(store
        .weight_history(user, now() - Duration::days(1))
        .await
        .unwrap()
        .is_empty());
}
