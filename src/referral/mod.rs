//! Referral program
//!
//! - Per-installation referral code (`DR` + 6 characters)
//! - One-time redemption of another user's code for bonus days
//! - Rewards history with milestone bonuses
//! - Share message and referrer notification collaborators

mod code;
mod manager;
mod notifier;
mod share;

pub use code::{generate_referral_code, is_valid_referral_code, normalize_code};
pub use manager::{ReferralManager, ReferralReward, ReferralState, ReferralStats, RewardKind};
pub use notifier::{HttpNotifier, NotifyError, ReferrerNotifier, TracingNotifier};
pub use share::{compose_share_message, referral_link, ShareMessage, ShareSurface};
