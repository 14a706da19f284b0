//! Key-value persistence for entitlement state
//!
//! Every manager persists small JSON blobs under fixed string keys and
//! rehydrates them at start. Backends:
//! - `MemoryStore` - in-process map, for tests and ephemeral sessions
//! - `FileStore` - one JSON file per key with atomic, locked writes

mod file;
mod memory;
mod retry;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use retry::{retry_with_backoff, RetryPolicy};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Key holding the serialized `SubscriptionState`
pub const SUBSCRIPTION_KEY: &str = "subscription_data";
/// Key holding the per-feature monthly counters
pub const USAGE_KEY: &str = "usage_data";
/// Key holding the month ordinal of the last usage reset
pub const LAST_RESET_KEY: &str = "last_usage_reset";
/// Key holding the serialized `ReferralState`
pub const REFERRAL_KEY: &str = "referral_data";

/// Durable storage for small string blobs, surviving process restarts
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Read and deserialize a JSON value, `None` when the key was never written
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// Serialize and write a value, retrying failed writes with backoff
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    policy: &RetryPolicy,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(value)?;
    save_raw(store, key, &json, policy).await
}

/// Write a raw string value, retrying failed writes with backoff
pub async fn save_raw(
    store: &dyn KeyValueStore,
    key: &str,
    value: &str,
    policy: &RetryPolicy,
) -> Result<(), StoreError> {
    retry_with_backoff(policy, move || store.set(key, value)).await?;
    tracing::debug!(key, bytes = value.len(), "Persisted entitlement data");
    Ok(())
}
