//! Error types for entitlement operations
//!
//! Validation errors carry a message meant to be shown to the user as-is.
//! Quota exhaustion is not an error: gates return `bool` or a `LimitCheckResult`.

use std::fmt;

/// Error raised by a [`KeyValueStore`](crate::store::KeyValueStore) backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored value for '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Failed to acquire storage lock: {0}")]
    Lock(String),
}

/// Grants that can be consumed at most once per installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneTimeGrant {
    Trial,
    ReferralCode,
}

impl fmt::Display for OneTimeGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trial => write!(f, "The free trial"),
            Self::ReferralCode => write!(f, "A referral code"),
        }
    }
}

/// Errors surfaced to UI collaborators
#[derive(Debug, thiserror::Error)]
pub enum EntitlementError {
    #[error("{0} has already been used on this device")]
    AlreadyUsed(OneTimeGrant),

    #[error("You cannot use your own referral code")]
    SelfReferral,

    #[error("Referral code '{0}' is not valid")]
    InvalidCode(String),

    #[error("Unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("Unknown product '{0}'")]
    UnknownProduct(String),

    #[error("Sharing failed: {0}")]
    ShareFailed(String),

    #[error("Failed to save entitlement data: {0}")]
    Persistence(#[from] StoreError),
}

impl From<EntitlementError> for String {
    fn from(err: EntitlementError) -> Self {
        err.to_string()
    }
}

pub type Result<T, E = EntitlementError> = std::result::Result<T, E>;
