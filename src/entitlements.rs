//! Entitlement facade
//!
//! One `Entitlements` is built at process start and shared by `Arc`. It owns
//! the subscription, usage and referral managers, each behind an async mutex.
//!
//! Locks are always taken in the order subscription → usage → referral.
//! Every read and gate first re-validates expiry and month rollover, so a
//! long-running process never serves a stale entitlement.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::billing::{
    plan_catalog, Feature, FeatureUsage, LimitCheckResult, LimitEnforcer, PaidPlan, PlanOffer,
    PurchaseReceipt, Remaining, SubscriptionInfo, SubscriptionManager, SubscriptionState,
    SubscriptionStatus, UsageLedger,
};
use crate::clock::{Clock, SystemClock};
use crate::config::EntitlementConfig;
use crate::error::Result;
use crate::referral::{
    HttpNotifier, ReferralManager, ReferralReward, ReferralStats, ReferrerNotifier, ShareMessage,
    ShareSurface, TracingNotifier,
};
use crate::store::{FileStore, KeyValueStore};

pub struct Entitlements {
    clock: Arc<dyn Clock>,
    trial_days: u32,
    enforcer: LimitEnforcer,
    subscription: Mutex<SubscriptionManager>,
    usage: Mutex<UsageLedger>,
    referral: Mutex<ReferralManager>,
}

impl Entitlements {
    /// Rehydrate all state from `store`
    ///
    /// Lapsed subscriptions are expired and a pending monthly reset is applied
    /// before this returns.
    pub async fn initialize(
        store: Arc<dyn KeyValueStore>,
        config: &EntitlementConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn ReferrerNotifier>,
    ) -> Result<Self> {
        let now = clock.now();

        let subscription = SubscriptionManager::load(
            Arc::clone(&store),
            config.retry.clone(),
            config.trial_days,
            now,
        )
        .await?;
        let usage = UsageLedger::load(Arc::clone(&store), config.retry.clone(), now).await?;
        let referral = ReferralManager::load(
            store,
            config.retry.clone(),
            notifier,
            config.referral_bonus_days,
            config.referral_link_base.clone(),
        )
        .await?;

        info!(
            status = %subscription.status(),
            referral_code = %referral.referral_code(),
            "Entitlements initialized"
        );

        Ok(Self {
            clock,
            trial_days: config.trial_days,
            enforcer: LimitEnforcer::with_limits(usage.limits().clone()),
            subscription: Mutex::new(subscription),
            usage: Mutex::new(usage),
            referral: Mutex::new(referral),
        })
    }

    /// File-backed entitlements on the system clock, configured from the environment
    pub async fn open_default() -> Result<Self> {
        let config = EntitlementConfig::from_env();
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.store_dir.clone()));

        let notifier: Arc<dyn ReferrerNotifier> = match config.referral_webhook.as_deref() {
            Some(endpoint) => match HttpNotifier::new(endpoint) {
                Ok(notifier) => Arc::new(notifier),
                Err(e) => {
                    warn!(error = %e, "Failed to build referral notifier, logging only");
                    Arc::new(TracingNotifier)
                }
            },
            None => Arc::new(TracingNotifier),
        };

        Self::initialize(store, &config, Arc::new(SystemClock), notifier).await
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Subscription lock, with a lapsed subscription expired first
    async fn fresh_subscription(&self, now: DateTime<Utc>) -> Result<MutexGuard<'_, SubscriptionManager>> {
        let mut subscription = self.subscription.lock().await;
        subscription.expire_if_due(now).await?;
        Ok(subscription)
    }

    /// Usage lock, with a pending monthly reset applied first
    async fn fresh_usage(&self, now: DateTime<Utc>) -> Result<MutexGuard<'_, UsageLedger>> {
        let mut usage = self.usage.lock().await;
        usage.reset_if_new_month(now).await?;
        Ok(usage)
    }

    // ========================================================================
    // Usage gates
    // ========================================================================

    pub async fn can_use_feature(&self, feature: Feature) -> Result<bool> {
        let now = self.now();
        let subscription = self.fresh_subscription(now).await?;
        let usage = self.fresh_usage(now).await?;
        Ok(usage.can_use_feature(feature, subscription.is_subscribed()))
    }

    pub async fn remaining_usage(&self, feature: Feature) -> Result<Remaining> {
        let now = self.now();
        let subscription = self.fresh_subscription(now).await?;
        let usage = self.fresh_usage(now).await?;
        Ok(usage.remaining_usage(feature, subscription.is_subscribed()))
    }

    /// Gate with a reason and upgrade link when denied
    pub async fn check_feature(&self, feature: Feature) -> Result<LimitCheckResult> {
        let now = self.now();
        let subscription = self.fresh_subscription(now).await?;
        let usage = self.fresh_usage(now).await?;

        let result = self
            .enforcer
            .check_limit(feature, subscription.is_subscribed(), usage.usage());
        if !result.is_allowed() {
            debug!(feature = %feature, "Feature gated");
        }
        Ok(result)
    }

    /// Record a use after the action succeeded
    pub async fn increment_usage(&self, feature: Feature) -> Result<()> {
        let now = self.now();
        let mut usage = self.fresh_usage(now).await?;
        usage.increment_usage(feature).await
    }

    /// Atomically check and consume one unit of quota
    ///
    /// Both locks are held for the whole check-and-consume, so concurrent
    /// callers can never overdraw a quota.
    pub async fn decrement_usage(&self, feature: Feature) -> Result<bool> {
        let now = self.now();
        let subscription = self.fresh_subscription(now).await?;
        let mut usage = self.fresh_usage(now).await?;
        usage
            .decrement_usage(feature, subscription.is_subscribed())
            .await
    }

    /// Per-feature usage for the current month
    pub async fn usage_summary(&self) -> Result<Vec<FeatureUsage>> {
        let now = self.now();
        let subscription = self.fresh_subscription(now).await?;
        let usage = self.fresh_usage(now).await?;
        Ok(Self::feature_usage(&usage, subscription.is_subscribed()))
    }

    fn feature_usage(usage: &UsageLedger, subscribed: bool) -> Vec<FeatureUsage> {
        Feature::ALL
            .into_iter()
            .map(|feature| FeatureUsage {
                feature,
                used: usage.used(feature),
                limit: usage.limit(feature),
                remaining: usage.remaining_usage(feature, subscribed),
            })
            .collect()
    }

    // ========================================================================
    // Subscription
    // ========================================================================

    pub async fn subscription_status(&self) -> Result<SubscriptionStatus> {
        let now = self.now();
        Ok(self.fresh_subscription(now).await?.status())
    }

    pub async fn is_subscribed(&self) -> Result<bool> {
        let now = self.now();
        Ok(self.fresh_subscription(now).await?.is_subscribed())
    }

    pub async fn days_until_expiry(&self) -> Result<u32> {
        let now = self.now();
        Ok(self.fresh_subscription(now).await?.days_until_expiry(now))
    }

    /// Copy of the persisted subscription record
    pub async fn subscription_snapshot(&self) -> Result<SubscriptionState> {
        let now = self.now();
        Ok(self.fresh_subscription(now).await?.state().clone())
    }

    /// Subscription plus this month's usage, for the subscription screen
    pub async fn subscription_info(&self) -> Result<SubscriptionInfo> {
        let now = self.now();
        let subscription = self.fresh_subscription(now).await?;
        let usage = self.fresh_usage(now).await?;

        Ok(SubscriptionInfo {
            status: subscription.status(),
            subscription_expiry: subscription.expiry(),
            days_until_expiry: subscription.days_until_expiry(now),
            trial_used: subscription.trial_used(),
            features: Self::feature_usage(&usage, subscription.is_subscribed()),
        })
    }

    pub async fn plan_catalog(&self) -> Result<Vec<PlanOffer>> {
        let now = self.now();
        let subscription = self.fresh_subscription(now).await?;
        Ok(plan_catalog(self.trial_days, subscription.trial_used()))
    }

    pub async fn start_trial(&self) -> Result<DateTime<Utc>> {
        let now = self.now();
        self.fresh_subscription(now).await?.start_trial(now).await
    }

    pub async fn subscribe(&self, plan: PaidPlan) -> Result<DateTime<Utc>> {
        let now = self.now();
        self.fresh_subscription(now).await?.subscribe(plan, now).await
    }

    /// Activate the plan a confirmed store purchase is for
    pub async fn apply_purchase(&self, receipt: &PurchaseReceipt) -> Result<DateTime<Utc>> {
        let plan = receipt.plan()?;
        info!(
            transaction_id = %receipt.transaction_id,
            product_id = %receipt.product_id,
            "Applying purchase"
        );
        self.subscribe(plan).await
    }

    pub async fn expire(&self) -> Result<()> {
        self.subscription.lock().await.expire().await
    }

    pub async fn extend(&self, days: u32) -> Result<DateTime<Utc>> {
        let now = self.now();
        self.fresh_subscription(now).await?.extend(days, now).await
    }

    // ========================================================================
    // Referrals
    // ========================================================================

    pub async fn referral_code(&self) -> String {
        self.referral.lock().await.referral_code().to_string()
    }

    /// Redeem another user's code; returns the new subscription expiry
    pub async fn use_referral_code(&self, code: &str) -> Result<DateTime<Utc>> {
        let now = self.now();
        let mut subscription = self.fresh_subscription(now).await?;
        let mut referral = self.referral.lock().await;
        referral
            .use_referral_code(code, &mut subscription, now)
            .await
    }

    pub async fn referral_rewards(&self) -> Vec<ReferralReward> {
        self.referral.lock().await.referral_rewards()
    }

    pub async fn referral_stats(&self) -> ReferralStats {
        self.referral.lock().await.referral_stats()
    }

    pub async fn record_successful_referral(&self) -> Result<ReferralStats> {
        self.referral.lock().await.record_successful_referral().await
    }

    pub async fn share_message(&self) -> ShareMessage {
        self.referral.lock().await.share_message()
    }

    pub async fn share_referral_code(&self, surface: &dyn ShareSurface) -> Result<()> {
        self.referral.lock().await.share_referral_code(surface).await
    }
}
