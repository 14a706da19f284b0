//! Integration tests for the entitlement facade.
//!
//! Drives end-to-end flows through `Entitlements` with an in-memory store and
//! a manual clock, plus a restart against a file-backed store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use drmojahed_entitlements::billing::SubscriptionType;
use drmojahed_entitlements::clock::ManualClock;
use drmojahed_entitlements::config::EntitlementConfig;
use drmojahed_entitlements::referral::TracingNotifier;
use drmojahed_entitlements::store::{
    FileStore, KeyValueStore, MemoryStore, RetryPolicy, SUBSCRIPTION_KEY,
};
use drmojahed_entitlements::{
    EntitlementError, Entitlements, Feature, PaidPlan, Remaining, SubscriptionStatus,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
}

fn test_config() -> EntitlementConfig {
    EntitlementConfig {
        retry: RetryPolicy::no_retry(),
        ..EntitlementConfig::default()
    }
}

async fn open(store: Arc<dyn KeyValueStore>, clock: Arc<ManualClock>) -> Entitlements {
    Entitlements::initialize(store, &test_config(), clock, Arc::new(TracingNotifier))
        .await
        .expect("should initialize")
}

async fn fresh() -> (Entitlements, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let entitlements = open(Arc::new(MemoryStore::new()), clock.clone()).await;
    (entitlements, clock)
}

#[tokio::test]
async fn test_fresh_install_text_to_video_quota() {
    let (entitlements, _clock) = fresh().await;

    assert!(entitlements.can_use_feature(Feature::TextToVideo).await.unwrap());
    assert_eq!(
        entitlements.remaining_usage(Feature::TextToVideo).await.unwrap(),
        Remaining::Limited(5)
    );

    for _ in 0..5 {
        assert!(entitlements.decrement_usage(Feature::TextToVideo).await.unwrap());
    }
    assert!(!entitlements.decrement_usage(Feature::TextToVideo).await.unwrap());
    assert_eq!(
        entitlements.remaining_usage(Feature::TextToVideo).await.unwrap(),
        Remaining::Limited(0)
    );
}

#[tokio::test]
async fn test_every_feature_quota_runs_out_at_its_limit() {
    let (entitlements, _clock) = fresh().await;
    let limits = [
        (Feature::TextToVideo, 5),
        (Feature::ImageToVideo, 3),
        (Feature::PoetryToVideo, 3),
        (Feature::ScriptToVideo, 2),
        (Feature::ImageEnhancement, 10),
        (Feature::StudioPhotos, 3),
        (Feature::CertificateMaker, 5),
        (Feature::BulkCertificateMaker, 2),
    ];

    for (feature, limit) in limits {
        for _ in 0..limit {
            assert!(entitlements.decrement_usage(feature).await.unwrap());
        }
        assert!(!entitlements.decrement_usage(feature).await.unwrap(), "{}", feature);
        assert_eq!(
            entitlements.remaining_usage(feature).await.unwrap(),
            Remaining::Limited(0)
        );
    }
}

#[tokio::test]
async fn test_monthly_subscription_is_unlimited() {
    let (entitlements, _clock) = fresh().await;
    entitlements.subscribe(PaidPlan::Monthly).await.unwrap();

    assert_eq!(
        entitlements.subscription_status().await.unwrap(),
        SubscriptionStatus::Monthly
    );
    let days = entitlements.days_until_expiry().await.unwrap();
    assert!((29..=31).contains(&days), "days = {}", days);

    for feature in Feature::ALL {
        assert_eq!(
            entitlements.remaining_usage(feature).await.unwrap(),
            Remaining::Unlimited
        );
    }
    // Subscribed consumption leaves counters alone
    for _ in 0..10 {
        assert!(entitlements.decrement_usage(Feature::ScriptToVideo).await.unwrap());
    }
    entitlements.expire().await.unwrap();
    assert_eq!(
        entitlements.remaining_usage(Feature::ScriptToVideo).await.unwrap(),
        Remaining::Limited(2)
    );
}

#[tokio::test]
async fn test_trial_only_once() {
    let (entitlements, clock) = fresh().await;

    entitlements.start_trial().await.unwrap();
    assert_eq!(entitlements.days_until_expiry().await.unwrap(), 7);

    let err = entitlements.start_trial().await.unwrap_err();
    assert!(matches!(err, EntitlementError::AlreadyUsed(_)));

    // Still refused after the trial lapses
    clock.advance(Duration::days(8));
    assert_eq!(
        entitlements.subscription_status().await.unwrap(),
        SubscriptionStatus::Free
    );
    assert!(entitlements.start_trial().await.is_err());
    assert!(entitlements.subscription_snapshot().await.unwrap().trial_used);
}

#[tokio::test]
async fn test_extend_on_fresh_install() {
    let (entitlements, _clock) = fresh().await;
    entitlements.extend(7).await.unwrap();

    let snapshot = entitlements.subscription_snapshot().await.unwrap();
    assert!(snapshot.is_subscribed);
    assert_eq!(snapshot.subscription_type, SubscriptionType::Trial);
    assert_eq!(entitlements.days_until_expiry().await.unwrap(), 7);
}

#[tokio::test]
async fn test_month_rollover_resets_once() {
    let (entitlements, clock) = fresh().await;
    for _ in 0..3 {
        entitlements.increment_usage(Feature::StudioPhotos).await.unwrap();
    }
    assert!(!entitlements.can_use_feature(Feature::StudioPhotos).await.unwrap());

    clock.set(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 1).unwrap());
    assert_eq!(
        entitlements.remaining_usage(Feature::StudioPhotos).await.unwrap(),
        Remaining::Limited(3)
    );

    entitlements.increment_usage(Feature::StudioPhotos).await.unwrap();
    clock.advance(Duration::days(10));
    // Same month: no second reset
    assert_eq!(
        entitlements.remaining_usage(Feature::StudioPhotos).await.unwrap(),
        Remaining::Limited(2)
    );
}

#[tokio::test]
async fn test_referral_flow() {
    let (entitlements, _clock) = fresh().await;
    let own = entitlements.referral_code().await;

    let err = entitlements.use_referral_code(&own).await.unwrap_err();
    assert!(matches!(err, EntitlementError::SelfReferral));

    let err = entitlements.use_referral_code("DR12").await.unwrap_err();
    assert!(matches!(err, EntitlementError::InvalidCode(_)));

    entitlements.use_referral_code("DRQ7W2ZK").await.unwrap();
    assert_eq!(
        entitlements.subscription_status().await.unwrap(),
        SubscriptionStatus::Trial
    );
    assert_eq!(entitlements.days_until_expiry().await.unwrap(), 7);

    let err = entitlements.use_referral_code("DRQ7W2ZK").await.unwrap_err();
    assert!(matches!(err, EntitlementError::AlreadyUsed(_)));

    // Bonus days do not consume the trial
    entitlements.start_trial().await.unwrap();

    // The one-time check runs before the self-referral check
    let err = entitlements.use_referral_code(&own).await.unwrap_err();
    assert!(matches!(err, EntitlementError::AlreadyUsed(_)));
}

#[tokio::test]
async fn test_past_expiry_in_storage_is_expired_on_start() {
    let store = Arc::new(MemoryStore::with_entries([(
        SUBSCRIPTION_KEY,
        r#"{"isSubscribed":true,"subscriptionType":"yearly","subscriptionExpiry":"2024-12-31T23:59:59.000Z","trialUsed":true}"#,
    )]));
    let clock = Arc::new(ManualClock::new(start()));
    let entitlements = open(store, clock).await;

    let snapshot = entitlements.subscription_snapshot().await.unwrap();
    assert!(!snapshot.is_subscribed);
    assert_eq!(snapshot.subscription_type, SubscriptionType::None);
    assert!(snapshot.subscription_expiry.is_none());
    assert!(snapshot.trial_used);
}

#[tokio::test]
async fn test_state_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));

    let code = {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
        let entitlements = open(store, clock.clone()).await;
        entitlements.subscribe(PaidPlan::Yearly).await.unwrap();
        entitlements.increment_usage(Feature::ImageEnhancement).await.unwrap();
        entitlements.use_referral_code("DRABCDEF").await.unwrap();
        entitlements.referral_code().await
    };

    clock.advance(Duration::days(3));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
    let reopened = open(store, clock.clone()).await;

    assert_eq!(
        reopened.subscription_status().await.unwrap(),
        SubscriptionStatus::Yearly
    );
    assert_eq!(reopened.referral_code().await, code);
    let stats = reopened.referral_stats().await;
    assert!(stats.has_used_referral);
    assert_eq!(stats.referred_by.as_deref(), Some("DRABCDEF"));

    let summary = reopened.usage_summary().await.unwrap();
    let enhancement = summary
        .iter()
        .find(|f| f.feature == Feature::ImageEnhancement)
        .unwrap();
    assert_eq!(enhancement.used, 1);
}
