//! Command surface for the UI layer

pub mod billing;
pub mod referral;
