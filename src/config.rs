//! Runtime configuration
//!
//! Defaults match the shipped product; each value can be overridden through
//! an environment variable (a `.env` file is honoured when present).

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::store::RetryPolicy;

const ENV_STORE_DIR: &str = "ENTITLEMENTS_STORE_DIR";
const ENV_TRIAL_DAYS: &str = "ENTITLEMENTS_TRIAL_DAYS";
const ENV_REFERRAL_BONUS_DAYS: &str = "ENTITLEMENTS_REFERRAL_BONUS_DAYS";
const ENV_REFERRAL_LINK_BASE: &str = "ENTITLEMENTS_REFERRAL_LINK_BASE";
const ENV_REFERRAL_WEBHOOK: &str = "ENTITLEMENTS_REFERRAL_WEBHOOK";
const ENV_WRITE_ATTEMPTS: &str = "ENTITLEMENTS_WRITE_ATTEMPTS";

#[derive(Debug, Clone)]
pub struct EntitlementConfig {
    /// Directory used by `FileStore`
    pub store_dir: PathBuf,
    /// Length of the one-time free trial
    pub trial_days: u32,
    /// Days granted to a user who redeems someone else's referral code
    pub referral_bonus_days: u32,
    /// Base of the shareable referral link, without trailing slash
    pub referral_link_base: String,
    /// Backend endpoint told about successful redemptions; logged only when unset
    pub referral_webhook: Option<String>,
    /// Backoff for persistence writes
    pub retry: RetryPolicy,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            store_dir: Self::default_store_dir(),
            trial_days: 7,
            referral_bonus_days: 7,
            referral_link_base: "https://drmojahedai.com/ref".to_string(),
            referral_webhook: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl EntitlementConfig {
    /// Build a config from defaults overlaid with environment variables
    pub fn from_env() -> Self {
        // Missing .env is the normal case
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(dir) = std::env::var(ENV_STORE_DIR) {
            if !dir.trim().is_empty() {
                config.store_dir = PathBuf::from(dir.trim());
            }
        }
        config.trial_days = env_number(ENV_TRIAL_DAYS, config.trial_days);
        config.referral_bonus_days = env_number(ENV_REFERRAL_BONUS_DAYS, config.referral_bonus_days);
        if let Ok(base) = std::env::var(ENV_REFERRAL_LINK_BASE) {
            let base = base.trim().trim_end_matches('/');
            if !base.is_empty() {
                config.referral_link_base = base.to_string();
            }
        }
        config.referral_webhook = std::env::var(ENV_REFERRAL_WEBHOOK)
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let attempts = env_number(ENV_WRITE_ATTEMPTS, config.retry.max_attempts);
        // Zero attempts would never write at all
        config.retry.max_attempts = attempts.max(1);

        config
    }

    /// `~/.config/drmojahed-ai/entitlements` (or platform equivalent)
    fn default_store_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drmojahed-ai")
            .join("entitlements")
    }
}

fn env_number<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, fallback = %default, "Ignoring invalid number in environment");
                default
            }
        },
        Err(_) => default,
    }
}
