use std::io;
use std::time::Duration;

use async_trait::async_trait;

use crate::domains::session::errors::{StorageError, StorageResult};
use crate::infra::services::store::{MemoryStore, SecureStore, StorageKey};

/// Store whose every operation fails, as a broken keystore would.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

#[async_trait]
impl SecureStore for FailingStore {
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        Err(StorageError::ReadFailed(io::Error::other(format!(
            "stub: cannot read {}",
            key.as_str()
        ))))
    }

    async fn set(&self, key: StorageKey, _value: &str) -> StorageResult<()> {
        Err(StorageError::WriteFailed(io::Error::other(format!(
            "stub: cannot write {}",
            key.as_str()
        ))))
    }

    async fn remove(&self, key: StorageKey) -> StorageResult<()> {
        Err(StorageError::WriteFailed(io::Error::other(format!(
            "stub: cannot remove {}",
            key.as_str()
        ))))
    }
}

/// In-memory store whose writes to selected keys take a while to land, as a
/// slow keystore would. Reads are immediate.
#[derive(Debug, Clone)]
pub struct DelayedStore {
    inner: MemoryStore,
    delay: Duration,
    slow_keys: Vec<StorageKey>,
}

impl DelayedStore {
    pub fn new(
        inner: MemoryStore,
        delay: Duration,
        slow_keys: &[StorageKey],
    ) -> Self {
        Self {
            inner,
            delay,
            slow_keys: slow_keys.to_vec(),
        }
    }

    async fn pause_for(&self, key: StorageKey) {
        if self.slow_keys.contains(&key) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl SecureStore for DelayedStore {
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: StorageKey, value: &str) -> StorageResult<()> {
        self.pause_for(key).await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: StorageKey) -> StorageResult<()> {
        self.pause_for(key).await;
        self.inner.remove(key).await
    }
}
