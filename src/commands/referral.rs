//! UI commands for the referral screen

use chrono::{DateTime, Utc};

use crate::entitlements::Entitlements;
use crate::referral::{ReferralReward, ReferralStats, ShareMessage, ShareSurface};

pub async fn get_referral_stats(entitlements: &Entitlements) -> Result<ReferralStats, String> {
    Ok(entitlements.referral_stats().await)
}

pub async fn get_referral_rewards(
    entitlements: &Entitlements,
) -> Result<Vec<ReferralReward>, String> {
    Ok(entitlements.referral_rewards().await)
}

/// Redeem a friend's code; returns the new subscription expiry
pub async fn redeem_referral_code(
    entitlements: &Entitlements,
    code: String,
) -> Result<DateTime<Utc>, String> {
    if code.trim().is_empty() {
        return Err("Please enter a referral code".to_string());
    }
    Ok(entitlements.use_referral_code(&code).await?)
}

pub async fn get_share_message(entitlements: &Entitlements) -> Result<ShareMessage, String> {
    Ok(entitlements.share_message().await)
}

pub async fn share_referral_code(
    entitlements: &Entitlements,
    surface: &dyn ShareSurface,
) -> Result<(), String> {
    Ok(entitlements.share_referral_code(surface).await?)
}

/// Credit a successful referral reported by the backend
pub async fn record_successful_referral(
    entitlements: &Entitlements,
) -> Result<ReferralStats, String> {
    Ok(entitlements.record_successful_referral().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::EntitlementConfig;
    use crate::referral::TracingNotifier;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn setup() -> Entitlements {
        Entitlements::initialize(
            Arc::new(MemoryStore::new()),
            &EntitlementConfig::default(),
            Arc::new(SystemClock),
            Arc::new(TracingNotifier),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_blank_code_rejected_before_lookup() {
        let entitlements = setup().await;
        let err = redeem_referral_code(&entitlements, "   ".to_string())
            .await
            .unwrap_err();
        assert_eq!(err, "Please enter a referral code");
    }

    #[tokio::test]
    async fn test_own_code_message() {
        let entitlements = setup().await;
        let own = get_referral_stats(&entitlements).await.unwrap().referral_code;
        let err = redeem_referral_code(&entitlements, own).await.unwrap_err();
        assert_eq!(err, "You cannot use your own referral code");
    }

    #[tokio::test]
    async fn test_redeem_then_stats() {
        let entitlements = setup().await;
        redeem_referral_code(&entitlements, "dr4k9z2q".to_string())
            .await
            .unwrap();

        let stats = get_referral_stats(&entitlements).await.unwrap();
        assert!(stats.has_used_referral);
        assert_eq!(stats.referred_by.as_deref(), Some("DR4K9Z2Q"));
        assert!(get_referral_rewards(&entitlements).await.unwrap().is_empty());
    }
}
