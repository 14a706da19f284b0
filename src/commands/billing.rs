//! UI commands for subscription management and usage metering
//!
//! Feature ids and product ids arrive as strings from the screens; errors are
//! returned as messages ready to show the user.

use chrono::{DateTime, Utc};

use crate::billing::{
    Feature, FeatureUsage, LimitCheckResult, PaidPlan, PlanOffer, PurchaseReceipt, Remaining,
    SubscriptionInfo, SubscriptionStatus,
};
use crate::entitlements::Entitlements;

fn parse_feature(feature_id: &str) -> Result<Feature, String> {
    feature_id.parse::<Feature>().map_err(String::from)
}

/// Check if a feature may run, without consuming quota
pub async fn can_use_feature(entitlements: &Entitlements, feature_id: String) -> Result<bool, String> {
    let feature = parse_feature(&feature_id)?;
    Ok(entitlements.can_use_feature(feature).await?)
}

/// Check a feature with the denial reason and upgrade link
pub async fn check_feature_limit(
    entitlements: &Entitlements,
    feature_id: String,
) -> Result<LimitCheckResult, String> {
    let feature = parse_feature(&feature_id)?;
    Ok(entitlements.check_feature(feature).await?)
}

/// Remaining uses this month (`null` when unlimited)
pub async fn get_remaining_usage(
    entitlements: &Entitlements,
    feature_id: String,
) -> Result<Remaining, String> {
    let feature = parse_feature(&feature_id)?;
    Ok(entitlements.remaining_usage(feature).await?)
}

/// Consume one use before a generation starts; `false` when the quota is spent
pub async fn consume_feature_use(
    entitlements: &Entitlements,
    feature_id: String,
) -> Result<bool, String> {
    let feature = parse_feature(&feature_id)?;
    Ok(entitlements.decrement_usage(feature).await?)
}

/// Record a use after a generation succeeded
pub async fn record_feature_use(entitlements: &Entitlements, feature_id: String) -> Result<(), String> {
    let feature = parse_feature(&feature_id)?;
    Ok(entitlements.increment_usage(feature).await?)
}

/// Usage for every feature this month
pub async fn get_usage_summary(entitlements: &Entitlements) -> Result<Vec<FeatureUsage>, String> {
    Ok(entitlements.usage_summary().await?)
}

pub async fn get_subscription_status(
    entitlements: &Entitlements,
) -> Result<SubscriptionStatus, String> {
    Ok(entitlements.subscription_status().await?)
}

/// Get full subscription info with limits and usage
pub async fn get_subscription_info(entitlements: &Entitlements) -> Result<SubscriptionInfo, String> {
    Ok(entitlements.subscription_info().await?)
}

pub async fn get_plans(entitlements: &Entitlements) -> Result<Vec<PlanOffer>, String> {
    Ok(entitlements.plan_catalog().await?)
}

pub async fn start_free_trial(entitlements: &Entitlements) -> Result<DateTime<Utc>, String> {
    Ok(entitlements.start_trial().await?)
}

/// Activate a plan after the store confirmed the purchase
pub async fn complete_purchase(
    entitlements: &Entitlements,
    transaction_id: String,
    product_id: String,
) -> Result<DateTime<Utc>, String> {
    let receipt = PurchaseReceipt {
        transaction_id,
        product_id,
        purchased_at: entitlements.now(),
    };
    Ok(entitlements.apply_purchase(&receipt).await?)
}

/// Activate a plan by id (`monthly` / `yearly`), for gateways without receipts
pub async fn subscribe_to_plan(
    entitlements: &Entitlements,
    plan_id: String,
) -> Result<DateTime<Utc>, String> {
    let plan = match plan_id.trim() {
        "monthly" => PaidPlan::Monthly,
        "yearly" => PaidPlan::Yearly,
        other => PaidPlan::from_product_id(other)?,
    };
    Ok(entitlements.subscribe(plan).await?)
}
