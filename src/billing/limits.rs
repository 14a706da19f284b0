//! Limit enforcement for metered features
//!
//! Checks subscription state and this month's usage before a feature runs.

use super::types::{Feature, FreeLimits, LimitCheckResult, LimitDenialReason, MonthlyUsage, Remaining};

/// Deep link that opens the subscription screen
pub const UPGRADE_URL: &str = "drmojahedai://subscription";

/// Limit enforcement service
pub struct LimitEnforcer {
    limits: FreeLimits,
}

impl LimitEnforcer {
    /// Create an enforcer with the default free-tier caps
    pub fn new() -> Self {
        Self::with_limits(FreeLimits::default())
    }

    pub fn with_limits(limits: FreeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FreeLimits {
        &self.limits
    }

    /// Check if a feature may run for this user
    ///
    /// Returns `LimitCheckResult::Allowed` with the remaining count (unlimited
    /// when subscribed), or `LimitCheckResult::Denied` with the upgrade link.
    pub fn check_limit(
        &self,
        feature: Feature,
        subscribed: bool,
        usage: &MonthlyUsage,
    ) -> LimitCheckResult {
        if subscribed {
            return LimitCheckResult::Allowed {
                remaining: Remaining::Unlimited,
            };
        }

        let limit = self.limits.limit(feature);
        let used = usage.get(feature);
        if used >= limit {
            return LimitCheckResult::Denied {
                reason: LimitDenialReason::QuotaExceeded {
                    feature,
                    limit,
                    used,
                },
                upgrade_url: Some(UPGRADE_URL.to_string()),
            };
        }

        LimitCheckResult::Allowed {
            remaining: Remaining::Limited(limit - used),
        }
    }
}

impl Default for LimitEnforcer {
    fn default() -> Self {
        Self::new()
    }
}
