//! Referral state and redemption
//!
//! Each installation owns one referral code, generated on first run and kept
//! under `referral_data`. Redeeming someone else's code once grants bonus
//! days on the subscription; the referrer is notified in the background.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::code::{generate_referral_code, is_valid_referral_code, normalize_code};
use super::notifier::ReferrerNotifier;
use super::share::{compose_share_message, ShareMessage, ShareSurface};
use crate::billing::SubscriptionManager;
use crate::error::{EntitlementError, OneTimeGrant, Result, StoreError};
use crate::store::{self, KeyValueStore, RetryPolicy, REFERRAL_KEY};

const FIRST_MILESTONE: u32 = 5;
const FIRST_MILESTONE_DAYS: u32 = 14;
const SECOND_MILESTONE: u32 = 10;
const SECOND_MILESTONE_DAYS: u32 = 30;

/// Persisted referral record (`referral_data`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferralState {
    #[serde(deserialize_with = "null_as_empty")]
    pub referral_code: String,
    pub referrals_count: u32,
    pub total_bonus_days: u32,
    pub referred_by: Option<String>,
    pub has_used_referral: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Referral,
    Milestone,
}

/// One line of the rewards history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralReward {
    #[serde(rename = "type")]
    pub kind: RewardKind,
    pub description: String,
    pub bonus_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub referral_code: String,
    pub referrals_count: u32,
    pub total_bonus_days: u32,
    pub has_used_referral: bool,
    pub referred_by: Option<String>,
}

pub struct ReferralManager {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    notifier: Arc<dyn ReferrerNotifier>,
    bonus_days: u32,
    link_base: String,
    state: ReferralState,
}

impl ReferralManager {
    /// Rehydrate from the store, generating and persisting a code on first run
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        retry: RetryPolicy,
        notifier: Arc<dyn ReferrerNotifier>,
        bonus_days: u32,
        link_base: impl Into<String>,
    ) -> Result<Self> {
        let stored = match store::load_json::<ReferralState>(store.as_ref(), REFERRAL_KEY).await {
            Ok(state) => state,
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!(reason = %reason, "Stored referral data is corrupt, starting over");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let mut manager = Self {
            store,
            retry,
            notifier,
            bonus_days,
            link_base: link_base.into(),
            state: stored.unwrap_or_default(),
        };

        if manager.state.referral_code.is_empty() {
            let next = ReferralState {
                referral_code: generate_referral_code(),
                ..manager.state.clone()
            };
            manager.commit(next).await?;
            info!(referral_code = %manager.state.referral_code, "Generated referral code");
        }

        Ok(manager)
    }

    pub fn state(&self) -> &ReferralState {
        &self.state
    }

    pub fn referral_code(&self) -> &str {
        &self.state.referral_code
    }

    /// Redeem another user's code, extending the subscription by the bonus days
    ///
    /// Checks run in order: already redeemed, own code, malformed code. On
    /// success the referrer is notified in the background; a failed
    /// notification is logged and does not undo the redemption.
    pub async fn use_referral_code(
        &mut self,
        input: &str,
        subscription: &mut SubscriptionManager,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let code = normalize_code(input);

        if self.state.has_used_referral {
            return Err(EntitlementError::AlreadyUsed(OneTimeGrant::ReferralCode));
        }
        if code == self.state.referral_code {
            return Err(EntitlementError::SelfReferral);
        }
        if !is_valid_referral_code(&code) {
            return Err(EntitlementError::InvalidCode(input.trim().to_string()));
        }

        // Extend before marking the code used; a failed save leaves it redeemable
        let expiry = subscription.extend(self.bonus_days, now).await?;

        self.commit(ReferralState {
            referred_by: Some(code.clone()),
            has_used_referral: true,
            ..self.state.clone()
        })
        .await?;

        info!(referred_by = %code, bonus_days = self.bonus_days, expiry = %expiry, "Redeemed referral code");
        self.notify_referrer(code);
        Ok(expiry)
    }

    /// Credit one successful referral of this user's code
    pub async fn record_successful_referral(&mut self) -> Result<ReferralStats> {
        self.commit(ReferralState {
            referrals_count: self.state.referrals_count.saturating_add(1),
            total_bonus_days: self.state.total_bonus_days.saturating_add(self.bonus_days),
            ..self.state.clone()
        })
        .await?;

        info!(
            referrals_count = self.state.referrals_count,
            total_bonus_days = self.state.total_bonus_days,
            "Recorded successful referral"
        );
        Ok(self.referral_stats())
    }

    pub fn referral_stats(&self) -> ReferralStats {
        ReferralStats {
            referral_code: self.state.referral_code.clone(),
            referrals_count: self.state.referrals_count,
            total_bonus_days: self.state.total_bonus_days,
            has_used_referral: self.state.has_used_referral,
            referred_by: self.state.referred_by.clone(),
        }
    }

    /// One entry per referral, plus milestone bonuses at 5 and 10 referrals
    pub fn referral_rewards(&self) -> Vec<ReferralReward> {
        let count = self.state.referrals_count;
        let mut rewards: Vec<ReferralReward> = (1..=count)
            .map(|n| ReferralReward {
                kind: RewardKind::Referral,
                description: format!("دعوة صديق #{}", n),
                bonus_days: self.bonus_days,
            })
            .collect();

        for (threshold, bonus_days) in [
            (FIRST_MILESTONE, FIRST_MILESTONE_DAYS),
            (SECOND_MILESTONE, SECOND_MILESTONE_DAYS),
        ] {
            if count >= threshold {
                rewards.push(ReferralReward {
                    kind: RewardKind::Milestone,
                    description: format!("إنجاز: {} دعوات", threshold),
                    bonus_days,
                });
            }
        }

        rewards
    }

    pub fn share_message(&self) -> ShareMessage {
        compose_share_message(&self.link_base, &self.state.referral_code, self.bonus_days)
    }

    pub async fn share_referral_code(&self, surface: &dyn ShareSurface) -> Result<()> {
        let message = self.share_message();
        surface.share(&message).await.map_err(|e| {
            warn!(error = %e, "Failed to share referral code");
            EntitlementError::ShareFailed(e)
        })
    }

    fn notify_referrer(&self, code: String) {
        let notifier = Arc::clone(&self.notifier);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = notifier.notify(&code).await {
                        warn!(referrer_code = %code, error = %e, "Failed to notify referrer");
                    }
                });
            }
            Err(_) => {
                warn!(referrer_code = %code, "No async runtime, skipping referrer notification");
            }
        }
    }

    async fn commit(&mut self, next: ReferralState) -> Result<()> {
        store::save_json(self.store.as_ref(), REFERRAL_KEY, &next, &self.retry).await?;
        self.state = next;
        Ok(())
    }
}
