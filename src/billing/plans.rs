//! Plan catalog and store purchase receipts
//!
//! Payment settlement happens outside this crate; once a store or gateway
//! confirms a purchase, its receipt is applied here to activate the plan.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::SubscriptionType;
use crate::error::EntitlementError;

/// Paid plans that `subscribe` accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaidPlan {
    Monthly,
    Yearly,
}

impl PaidPlan {
    /// In-app purchase product id
    pub fn product_id(self) -> &'static str {
        match self {
            Self::Monthly => "dr_mujahid_monthly_pro",
            Self::Yearly => "dr_mujahid_yearly_pro",
        }
    }

    pub fn from_product_id(product_id: &str) -> Result<Self, EntitlementError> {
        match product_id.trim() {
            "dr_mujahid_monthly_pro" => Ok(Self::Monthly),
            "dr_mujahid_yearly_pro" => Ok(Self::Yearly),
            other => Err(EntitlementError::UnknownProduct(other.to_string())),
        }
    }

    pub fn subscription_type(self) -> SubscriptionType {
        match self {
            Self::Monthly => SubscriptionType::Monthly,
            Self::Yearly => SubscriptionType::Yearly,
        }
    }

    /// One calendar month or year after `from` (day clamped to month end)
    pub fn expiry_from(self, from: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Self::Monthly => Months::new(1),
            Self::Yearly => Months::new(12),
        };
        from.checked_add_months(months)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Price in halalas (SAR / 100)
    pub fn price_halalas(self) -> u32 {
        match self {
            Self::Monthly => 2_999,
            Self::Yearly => 29_999,
        }
    }
}

impl fmt::Display for PaidPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

/// Plan card shown on the subscription screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOffer {
    pub id: String,
    pub product_id: Option<String>,
    pub price_halalas: u32,
    pub currency: String,
    /// Fixed duration for the trial; paid plans run a calendar period
    pub duration_days: Option<u32>,
    /// Trial offer is greyed out once used
    pub available: bool,
    pub popular: bool,
}

/// Catalog in display order: trial, monthly, yearly
pub fn plan_catalog(trial_days: u32, trial_used: bool) -> Vec<PlanOffer> {
    let paid = |plan: PaidPlan, popular: bool| PlanOffer {
        id: plan.to_string(),
        product_id: Some(plan.product_id().to_string()),
        price_halalas: plan.price_halalas(),
        currency: "SAR".to_string(),
        duration_days: None,
        available: true,
        popular,
    };

    vec![
        PlanOffer {
            id: "trial".to_string(),
            product_id: None,
            price_halalas: 0,
            currency: "SAR".to_string(),
            duration_days: Some(trial_days),
            available: !trial_used,
            popular: false,
        },
        paid(PaidPlan::Monthly, false),
        paid(PaidPlan::Yearly, true),
    ]
}

/// Acknowledged purchase reported by the app store or payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub transaction_id: String,
    pub product_id: String,
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseReceipt {
    pub fn plan(&self) -> Result<PaidPlan, EntitlementError> {
        PaidPlan::from_product_id(&self.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_monthly_expiry_is_calendar_month() {
        let jan_31 = Utc.with_ymd_and_hms(2025, 1, 31, 9, 0, 0).unwrap();
        let expiry = PaidPlan::Monthly.expiry_from(jan_31);
        // Clamped to the last day of February
        assert_eq!(expiry, Utc.with_ymd_and_hms(2025, 2, 28, 9, 0, 0).unwrap());

        let mar_10 = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        assert_eq!(
            PaidPlan::Monthly.expiry_from(mar_10),
            Utc.with_ymd_and_hms(2025, 4, 10, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_yearly_expiry() {
        let leap_day = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(
            PaidPlan::Yearly.expiry_from(leap_day),
            Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_product_ids() {
        for plan in [PaidPlan::Monthly, PaidPlan::Yearly] {
            assert_eq!(PaidPlan::from_product_id(plan.product_id()).unwrap(), plan);
        }
        assert!(matches!(
            PaidPlan::from_product_id("dr_mujahid_lifetime"),
            Err(EntitlementError::UnknownProduct(_))
        ));
    }

    #[test]
    fn test_catalog_marks_used_trial_unavailable() {
        let catalog = plan_catalog(7, true);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].id, "trial");
        assert!(!catalog[0].available);
        assert_eq!(catalog[0].duration_days, Some(7));
        assert_eq!(catalog[1].price_halalas, 2_999);
        assert!(catalog[2].popular);

        assert!(plan_catalog(7, false)[0].available);
    }
}
