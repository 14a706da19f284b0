//! Billing data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EntitlementError;

/// A meterable capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    TextToVideo,
    ImageToVideo,
    PoetryToVideo,
    ScriptToVideo,
    ImageEnhancement,
    StudioPhotos,
    CertificateMaker,
    BulkCertificateMaker,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::TextToVideo,
        Feature::ImageToVideo,
        Feature::PoetryToVideo,
        Feature::ScriptToVideo,
        Feature::ImageEnhancement,
        Feature::StudioPhotos,
        Feature::CertificateMaker,
        Feature::BulkCertificateMaker,
    ];

    /// Stable id used in storage and by UI collaborators
    pub fn id(self) -> &'static str {
        match self {
            Self::TextToVideo => "textToVideo",
            Self::ImageToVideo => "imageToVideo",
            Self::PoetryToVideo => "poetryToVideo",
            Self::ScriptToVideo => "scriptToVideo",
            Self::ImageEnhancement => "imageEnhancement",
            Self::StudioPhotos => "studioPhotos",
            Self::CertificateMaker => "certificateMaker",
            Self::BulkCertificateMaker => "bulkCertificateMaker",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Feature {
    type Err = EntitlementError;

    /// Accepts the canonical id plus the kebab/snake-case spellings some screens use
    /// (`certificate-maker`, `bulk_certificate_maker`, ...). Matching ignores case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Feature::ALL
            .into_iter()
            .find(|feature| feature.id().to_ascii_lowercase() == folded)
            .ok_or_else(|| EntitlementError::UnknownFeature(s.to_string()))
    }
}

/// Monthly free-tier caps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeLimits {
    pub text_to_video: u32,
    pub image_to_video: u32,
    pub poetry_to_video: u32,
    pub script_to_video: u32,
    pub image_enhancement: u32,
    pub studio_photos: u32,
    pub certificate_maker: u32,
    pub bulk_certificate_maker: u32,
}

impl Default for FreeLimits {
    fn default() -> Self {
        Self {
            text_to_video: 5,
            image_to_video: 3,
            poetry_to_video: 3,
            script_to_video: 2,
            image_enhancement: 10,
            studio_photos: 3,
            certificate_maker: 5,
            bulk_certificate_maker: 2,
        }
    }
}

impl FreeLimits {
    /// Get the cap for a feature
    pub fn limit(&self, feature: Feature) -> u32 {
        match feature {
            Feature::TextToVideo => self.text_to_video,
            Feature::ImageToVideo => self.image_to_video,
            Feature::PoetryToVideo => self.poetry_to_video,
            Feature::ScriptToVideo => self.script_to_video,
            Feature::ImageEnhancement => self.image_enhancement,
            Feature::StudioPhotos => self.studio_photos,
            Feature::CertificateMaker => self.certificate_maker,
            Feature::BulkCertificateMaker => self.bulk_certificate_maker,
        }
    }
}

/// Uses per feature in the current calendar month
///
/// Stored under `usage_data`. Keys missing from an older blob read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthlyUsage {
    pub text_to_video: u32,
    pub image_to_video: u32,
    pub poetry_to_video: u32,
    pub script_to_video: u32,
    pub image_enhancement: u32,
    pub studio_photos: u32,
    pub certificate_maker: u32,
    pub bulk_certificate_maker: u32,
}

impl MonthlyUsage {
    /// Get usage for a feature
    pub fn get(&self, feature: Feature) -> u32 {
        match feature {
            Feature::TextToVideo => self.text_to_video,
            Feature::ImageToVideo => self.image_to_video,
            Feature::PoetryToVideo => self.poetry_to_video,
            Feature::ScriptToVideo => self.script_to_video,
            Feature::ImageEnhancement => self.image_enhancement,
            Feature::StudioPhotos => self.studio_photos,
            Feature::CertificateMaker => self.certificate_maker,
            Feature::BulkCertificateMaker => self.bulk_certificate_maker,
        }
    }

    fn slot(&mut self, feature: Feature) -> &mut u32 {
        match feature {
            Feature::TextToVideo => &mut self.text_to_video,
            Feature::ImageToVideo => &mut self.image_to_video,
            Feature::PoetryToVideo => &mut self.poetry_to_video,
            Feature::ScriptToVideo => &mut self.script_to_video,
            Feature::ImageEnhancement => &mut self.image_enhancement,
            Feature::StudioPhotos => &mut self.studio_photos,
            Feature::CertificateMaker => &mut self.certificate_maker,
            Feature::BulkCertificateMaker => &mut self.bulk_certificate_maker,
        }
    }

    /// Copy with one more use of `feature`
    pub fn incremented(&self, feature: Feature) -> Self {
        let mut next = self.clone();
        let slot = next.slot(feature);
        *slot = slot.saturating_add(1);
        next
    }

    pub fn total(&self) -> u64 {
        Feature::ALL.iter().map(|f| u64::from(self.get(*f))).sum()
    }
}

/// Remaining quota for a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Remaining {
    /// Subscribed users are never metered (serialized as `null`)
    Unlimited,
    Limited(u32),
}

impl Remaining {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// `None` when unlimited
    pub fn count(&self) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::Limited(n) => Some(*n),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Limited(0))
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "∞"),
            Self::Limited(n) => write!(f, "{}", n),
        }
    }
}

/// Stored subscription kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    #[default]
    None,
    Trial,
    Monthly,
    Yearly,
}

/// Status shown to the user; `Free` whenever not subscribed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Trial,
    Monthly,
    Yearly,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Trial => write!(f, "trial"),
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

/// Persisted subscription record (`subscription_data`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionState {
    pub is_subscribed: bool,
    /// Older blobs store `null` for "no subscription"
    #[serde(deserialize_with = "null_as_none")]
    pub subscription_type: SubscriptionType,
    pub subscription_expiry: Option<DateTime<Utc>>,
    /// Monotonic: never cleared once set
    pub trial_used: bool,
}

impl SubscriptionState {
    pub fn status(&self) -> SubscriptionStatus {
        if !self.is_subscribed {
            return SubscriptionStatus::Free;
        }
        match self.subscription_type {
            SubscriptionType::Trial => SubscriptionStatus::Trial,
            SubscriptionType::Monthly => SubscriptionStatus::Monthly,
            SubscriptionType::Yearly => SubscriptionStatus::Yearly,
            SubscriptionType::None => SubscriptionStatus::Free,
        }
    }
}

fn null_as_none<'de, D>(deserializer: D) -> Result<SubscriptionType, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<SubscriptionType>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Result of a limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
#[serde(tag = "type")]
pub enum LimitCheckResult {
    #[serde(rename = "allowed")]
    Allowed { remaining: Remaining },
    #[serde(rename = "denied")]
    Denied {
        reason: LimitDenialReason,
        upgrade_url: Option<String>,
    },
}

impl LimitCheckResult {
    /// Check if the request is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Get the denial reason if denied
    pub fn denial_reason(&self) -> Option<&LimitDenialReason> {
        match self {
            Self::Denied { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Reason for denying a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum LimitDenialReason {
    #[serde(rename = "quotaExceeded")]
    QuotaExceeded {
        feature: Feature,
        limit: u32,
        used: u32,
    },
}

impl fmt::Display for LimitDenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaExceeded {
                feature,
                limit,
                used,
            } => {
                write!(
                    f,
                    "Monthly free limit reached for {}: {}/{} uses",
                    feature, used, limit
                )
            }
        }
    }
}

/// Per-feature view for the usage screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsage {
    pub feature: Feature,
    pub used: u32,
    pub limit: u32,
    pub remaining: Remaining,
}

/// Full subscription view with limits and usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub status: SubscriptionStatus,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub days_until_expiry: u32,
    pub trial_used: bool,
    pub features: Vec<FeatureUsage>,
}
