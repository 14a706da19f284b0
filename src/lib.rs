//! Entitlement and usage-metering core for the Dr. Mojahed AI app
//!
//! Decides which AI features a user may invoke and how often: a monthly free
//! quota per feature, a one-time trial, paid monthly/yearly plans and a
//! referral program that grants bonus days. State is persisted through a
//! [`store::KeyValueStore`] and rehydrated at start.

pub mod billing;
pub mod clock;
pub mod commands;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod referral;
pub mod store;

pub use billing::{Feature, PaidPlan, Remaining, SubscriptionStatus};
pub use entitlements::Entitlements;
pub use error::{EntitlementError, Result, StoreError};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Filter comes from `RUST_LOG`, defaulting to warn for dependencies and info
/// for this crate. Use `RUST_LOG=debug` for per-mutation logs. Calling this
/// again after a subscriber is installed does nothing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,drmojahed_entitlements=info")),
        )
        .try_init();
}
