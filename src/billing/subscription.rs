//! Subscription lifecycle with local persistence
//!
//! States: none → trial → expired (none), none → monthly/yearly → expired,
//! and any active state → extended (same type, later expiry).
//! The record lives under `subscription_data` and is rewritten on every change.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::plans::PaidPlan;
use super::types::{SubscriptionState, SubscriptionStatus, SubscriptionType};
use crate::error::{EntitlementError, OneTimeGrant, Result, StoreError};
use crate::store::{self, KeyValueStore, RetryPolicy, SUBSCRIPTION_KEY};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Subscription manager backed by the key-value store
pub struct SubscriptionManager {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    trial_days: u32,
    state: SubscriptionState,
}

impl SubscriptionManager {
    /// Rehydrate from the store and expire a lapsed subscription before any read
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        retry: RetryPolicy,
        trial_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let state = match store::load_json::<SubscriptionState>(store.as_ref(), SUBSCRIPTION_KEY)
            .await
        {
            Ok(state) => state.unwrap_or_default(),
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!(reason = %reason, "Stored subscription is corrupt, treating as free");
                SubscriptionState::default()
            }
            Err(e) => return Err(e.into()),
        };

        let mut manager = Self {
            store,
            retry,
            trial_days,
            state,
        };
        manager.expire_if_due(now).await?;
        Ok(manager)
    }

    pub fn state(&self) -> &SubscriptionState {
        &self.state
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.is_subscribed
    }

    pub fn trial_used(&self) -> bool {
        self.state.trial_used
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.state.subscription_expiry
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.state.status()
    }

    /// Whole days left, rounded up; 0 without an expiry or once past it
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> u32 {
        let Some(expiry) = self.state.subscription_expiry else {
            return 0;
        };
        let millis = (expiry - now).num_milliseconds();
        if millis <= 0 {
            return 0;
        }
        let days = (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// Expire when past the stored expiry, or when the record is inconsistent
    /// (subscribed or typed but without an expiry). Returns `true` if it expired.
    pub async fn expire_if_due(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let due = match self.state.subscription_expiry {
            Some(expiry) => now > expiry,
            None => {
                self.state.is_subscribed || self.state.subscription_type != SubscriptionType::None
            }
        };
        if !due {
            return Ok(false);
        }

        info!(
            subscription_type = ?self.state.subscription_type,
            expiry = ?self.state.subscription_expiry,
            "Subscription lapsed"
        );
        self.expire().await?;
        Ok(true)
    }

    /// Start the one-time free trial
    pub async fn start_trial(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if self.state.trial_used {
            return Err(EntitlementError::AlreadyUsed(OneTimeGrant::Trial));
        }

        let expiry = now + Duration::days(i64::from(self.trial_days));
        self.commit(SubscriptionState {
            is_subscribed: true,
            subscription_type: SubscriptionType::Trial,
            subscription_expiry: Some(expiry),
            trial_used: true,
        })
        .await?;

        info!(expiry = %expiry, days = self.trial_days, "Started free trial");
        Ok(expiry)
    }

    /// Activate a paid plan
    ///
    /// The period always starts at `now`; time left on an active subscription is not carried over.
    pub async fn subscribe(&mut self, plan: PaidPlan, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let expiry = plan.expiry_from(now);
        self.commit(SubscriptionState {
            is_subscribed: true,
            subscription_type: plan.subscription_type(),
            subscription_expiry: Some(expiry),
            trial_used: self.state.trial_used,
        })
        .await?;

        info!(plan = %plan, expiry = %expiry, "Subscribed");
        Ok(expiry)
    }

    /// Drop back to the free tier; the trial flag is kept
    pub async fn expire(&mut self) -> Result<()> {
        self.commit(SubscriptionState {
            is_subscribed: false,
            subscription_type: SubscriptionType::None,
            subscription_expiry: None,
            trial_used: self.state.trial_used,
        })
        .await?;

        info!("Subscription expired");
        Ok(())
    }

    /// Push expiry `days` past the later of the current expiry and `now`
    ///
    /// An unsubscribed user is moved onto a trial-type entitlement. `trial_used`
    /// is left untouched, so bonus days never consume the one-time trial.
    pub async fn extend(&mut self, days: u32, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let base = match self.state.subscription_expiry {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        let expiry = base + Duration::days(i64::from(days));

        let subscription_type = if self.state.is_subscribed {
            self.state.subscription_type
        } else {
            SubscriptionType::Trial
        };

        self.commit(SubscriptionState {
            is_subscribed: true,
            subscription_type,
            subscription_expiry: Some(expiry),
            trial_used: self.state.trial_used,
        })
        .await?;

        info!(days, expiry = %expiry, subscription_type = ?subscription_type, "Extended subscription");
        Ok(expiry)
    }

    /// Persist first, then swap the in-memory record
    async fn commit(&mut self, next: SubscriptionState) -> Result<()> {
        store::save_json(self.store.as_ref(), SUBSCRIPTION_KEY, &next, &self.retry).await?;
        self.state = next;
        Ok(())
    }
}
