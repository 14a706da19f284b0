//! Billing module for subscription management and usage metering
//!
//! This module handles:
//! - Subscription lifecycle (free, trial, monthly, yearly)
//! - Monthly usage counters per feature with calendar-month reset
//! - Limit enforcement before a metered feature runs
//! - Plan catalog and purchase receipts

mod limits;
mod plans;
mod subscription;
mod types;
mod usage;

pub use limits::{LimitEnforcer, UPGRADE_URL};
pub use plans::{plan_catalog, PaidPlan, PlanOffer, PurchaseReceipt};
pub use subscription::SubscriptionManager;
pub use types::{
    Feature, FeatureUsage, FreeLimits, LimitCheckResult, LimitDenialReason, MonthlyUsage,
    Remaining, SubscriptionInfo, SubscriptionState, SubscriptionStatus, SubscriptionType,
};
pub use usage::UsageLedger;
