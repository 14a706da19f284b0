//! File-backed key-value store
//!
//! Each key is stored as `<key>.json` inside the store directory
//! (default `~/.config/drmojahed-ai/entitlements/`).
//!
//! ## Concurrency Safety
//! Writes take an exclusive fs2 lock on `<key>.lock`, write to a temp file
//! and rename it over the target, so a crash never leaves a half-written blob
//! and two processes never interleave writes to the same key.

use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::KeyValueStore;
use crate::error::StoreError;

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid storage key: {:?}", key),
            )))
        }
    }

    fn value_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.json", key))
    }

    fn temp_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.json.tmp", key))
    }

    fn lock_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.lock", key))
    }

    /// Acquire an exclusive lock for a key.
    /// The returned handle must be kept alive while holding the lock.
    fn acquire_lock(dir: &Path, key: &str) -> Result<File, StoreError> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(Self::lock_path(dir, key))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| StoreError::Lock(e.to_string()))?;

        Ok(lock_file)
    }

    fn read_blocking(dir: &Path, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(Self::value_path(dir, key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_blocking(dir: &Path, key: &str, value: &str) -> Result<(), StoreError> {
        let _lock = Self::acquire_lock(dir, key)?;

        let temp_path = Self::temp_path(dir, key);
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, Self::value_path(dir, key))?;

        // Lock is released when _lock is dropped
        Ok(())
    }

    fn remove_blocking(dir: &Path, key: &str) -> Result<(), StoreError> {
        let _lock = Self::acquire_lock(dir, key)?;

        match fs::remove_file(Self::value_path(dir, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn run_blocking<T, F>(&self, key: &str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path, &str) -> Result<T, StoreError> + Send + 'static,
    {
        Self::validate_key(key)?;
        let dir = self.dir.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || op(&dir, &key))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.run_blocking(key, Self::read_blocking).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = value.to_string();
        self.run_blocking(key, move |dir, key| Self::write_blocking(dir, key, &value))
            .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.run_blocking(key, Self::remove_blocking).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (FileStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("entitlements"));
        (store, dir)
    }

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.get("usage_data").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let (store, _dir) = create_test_store();

        store.set("usage_data", r#"{"textToVideo":2}"#).await.unwrap();
        assert_eq!(
            store.get("usage_data").await.unwrap().as_deref(),
            Some(r#"{"textToVideo":2}"#)
        );

        // No temp file left behind after the rename
        assert!(!FileStore::temp_path(store.dir(), "usage_data").exists());
        assert!(FileStore::value_path(store.dir(), "usage_data").exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let (store, dir) = create_test_store();
        store.set("last_usage_reset", "24300").await.unwrap();
        drop(store);

        let reopened = FileStore::new(dir.path().join("entitlements"));
        assert_eq!(
            reopened.get("last_usage_reset").await.unwrap().as_deref(),
            Some("24300")
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _dir) = create_test_store();
        store.set("referral_data", "{}").await.unwrap();
        store.remove("referral_data").await.unwrap();
        assert_eq!(store.get("referral_data").await.unwrap(), None);

        // Removing again is fine
        store.remove("referral_data").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (store, _dir) = create_test_store();
        assert!(store.set("../escape", "x").await.is_err());
        assert!(store.get("a/b").await.is_err());
        assert!(store.get("").await.is_err());
    }
}
