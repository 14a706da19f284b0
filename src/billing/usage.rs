//! Monthly usage metering
//!
//! Tracks per-feature uses for the current calendar month against the free
//! tier caps. Counters are persisted under `usage_data` after every mutation
//! and zeroed once when the month ordinal stored under `last_usage_reset`
//! falls behind the current month.
//!
//! Note: month boundaries are computed in UTC (see `clock::month_ordinal`).

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{Feature, FreeLimits, MonthlyUsage, Remaining};
use crate::clock::month_ordinal;
use crate::error::{Result, StoreError};
use crate::store::{self, KeyValueStore, RetryPolicy, LAST_RESET_KEY, USAGE_KEY};

/// Per-feature usage counters for the free tier
pub struct UsageLedger {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    limits: FreeLimits,
    usage: MonthlyUsage,
    last_reset_month: Option<i64>,
}

impl UsageLedger {
    /// Rehydrate counters from the store, then apply any pending monthly reset
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        retry: RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let usage = match store::load_json::<MonthlyUsage>(store.as_ref(), USAGE_KEY).await {
            Ok(usage) => usage.unwrap_or_default(),
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!(reason = %reason, "Stored usage is corrupt, starting from zero");
                MonthlyUsage::default()
            }
            Err(e) => return Err(e.into()),
        };

        let last_reset_month = match store.get(LAST_RESET_KEY).await? {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(month) => Some(month),
                Err(_) => {
                    warn!(value = %raw, "Ignoring unreadable usage reset marker");
                    None
                }
            },
            None => None,
        };

        let mut ledger = Self {
            store,
            retry,
            limits: FreeLimits::default(),
            usage,
            last_reset_month,
        };
        ledger.reset_if_new_month(now).await?;
        Ok(ledger)
    }

    pub fn limits(&self) -> &FreeLimits {
        &self.limits
    }

    pub fn usage(&self) -> &MonthlyUsage {
        &self.usage
    }

    /// Uses recorded this month
    pub fn used(&self, feature: Feature) -> u32 {
        self.usage.get(feature)
    }

    pub fn limit(&self, feature: Feature) -> u32 {
        self.limits.limit(feature)
    }

    /// Month ordinal of the last reset, `None` before the first run persisted one
    pub fn last_reset_month(&self) -> Option<i64> {
        self.last_reset_month
    }

    /// Subscribed users always pass; free users pass while under the cap
    pub fn can_use_feature(&self, feature: Feature, subscribed: bool) -> bool {
        subscribed || self.used(feature) < self.limit(feature)
    }

    pub fn remaining_usage(&self, feature: Feature, subscribed: bool) -> Remaining {
        if subscribed {
            return Remaining::Unlimited;
        }
        Remaining::Limited(self.limit(feature).saturating_sub(self.used(feature)))
    }

    /// Record a use after a successful action, regardless of subscription
    pub async fn increment_usage(&mut self, feature: Feature) -> Result<()> {
        let next = self.usage.incremented(feature);
        self.commit_usage(next).await?;

        debug!(feature = %feature, used = self.used(feature), "Incremented usage");
        Ok(())
    }

    /// Consume one unit of quota before a metered action
    ///
    /// Subscribed users pass without touching counters. Free users consume a
    /// unit while under the cap; at the cap nothing changes and `false` is returned.
    pub async fn decrement_usage(&mut self, feature: Feature, subscribed: bool) -> Result<bool> {
        if subscribed {
            return Ok(true);
        }

        let used = self.used(feature);
        let limit = self.limit(feature);
        if used >= limit {
            debug!(feature = %feature, used, limit, "Quota exhausted");
            return Ok(false);
        }

        self.commit_usage(self.usage.incremented(feature)).await?;
        debug!(feature = %feature, used = used + 1, limit, "Consumed quota");
        Ok(true)
    }

    /// Zero every counter if the calendar month moved past the stored marker
    ///
    /// Returns `true` when a reset happened. A second call in the same month is a no-op.
    ///
    /// Counters are zeroed before the month marker is written, and memory follows
    /// the counters as soon as they are on disk. If the marker write fails, the
    /// ledger holds zeroed counters but still reports the old month. Call this
    /// again before recording any use after an error.
    pub async fn reset_if_new_month(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let current = month_ordinal(now);

        let Some(last) = self.last_reset_month else {
            // First run: remember the month, nothing to reset yet
            store::save_raw(
                self.store.as_ref(),
                LAST_RESET_KEY,
                &current.to_string(),
                &self.retry,
            )
            .await?;
            self.last_reset_month = Some(current);
            return Ok(false);
        };

        if current <= last {
            return Ok(false);
        }

        let previous_total = self.usage.total();
        self.commit_usage(MonthlyUsage::default()).await?;
        store::save_raw(
            self.store.as_ref(),
            LAST_RESET_KEY,
            &current.to_string(),
            &self.retry,
        )
        .await?;
        self.last_reset_month = Some(current);

        info!(
            from_month = last,
            to_month = current,
            cleared_uses = previous_total,
            "Reset monthly usage"
        );
        Ok(true)
    }

    async fn commit_usage(&mut self, next: MonthlyUsage) -> Result<()> {
        store::save_json(self.store.as_ref(), USAGE_KEY, &next, &self.retry).await?;
        self.usage = next;
        Ok(())
    }
}
