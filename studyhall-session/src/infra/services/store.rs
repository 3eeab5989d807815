//! Secure store trait and the in-memory implementation
//!
//! Values live under a small set of fixed keys. The typed helpers on the
//! trait encode/decode the token and the cached user blob.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use studyhall_model::User;

use crate::domains::session::errors::StorageResult;
use crate::domains::session::security::AccessToken;

/// Fixed storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AccessToken,
    User,
    PushToken,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] =
        [StorageKey::AccessToken, StorageKey::User, StorageKey::PushToken];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::AccessToken => "auth_token",
            StorageKey::User => "user_data",
            StorageKey::PushToken => "fcm_token",
        }
    }
}

#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>>;

    async fn set(&self, key: StorageKey, value: &str) -> StorageResult<()>;

    async fn remove(&self, key: StorageKey) -> StorageResult<()>;

    async fn load_token(&self) -> StorageResult<Option<AccessToken>> {
        Ok(self
            .get(StorageKey::AccessToken)
            .await?
            .filter(|token| !token.is_empty())
            .map(AccessToken::from))
    }

    async fn save_token(&self, token: &AccessToken) -> StorageResult<()> {
        self.set(StorageKey::AccessToken, token.expose_secret()).await
    }

    async fn load_user(&self) -> StorageResult<Option<User>> {
        match self.get(StorageKey::User).await? {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    async fn save_user(&self, user: &User) -> StorageResult<()> {
        let blob = serde_json::to_string(user)?;
        self.set(StorageKey::User, &blob).await
    }

    /// Remove the token and cached user. The push token survives logout.
    async fn clear_session(&self) -> StorageResult<()> {
        self.remove(StorageKey::AccessToken).await?;
        self.remove(StorageKey::User).await
    }
}

/// Process-local store, for tests and sessions that must not persist.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<StorageKey, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous peek, handy for assertions.
    pub fn peek(&self, key: StorageKey) -> Option<String> {
        self.entries.lock().get(&key).cloned()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: StorageKey, value: &str) -> StorageResult<()> {
        self.entries.lock().insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> StorageResult<()> {
        self.entries.lock().remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::session::errors::StorageError;

    #[tokio::test]
    async fn typed_helpers_round_trip() {
        let store = MemoryStore::new();
        let user = User::new("u-1").with_phone("9999999999");

        store.save_token(&AccessToken::from("tok")).await.unwrap();
        store.save_user(&user).await.unwrap();

        assert_eq!(
            store.load_token().await.unwrap().unwrap().expose_secret(),
            "tok"
        );
        assert_eq!(store.load_user().await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn clear_session_keeps_push_token() {
        let store = MemoryStore::new();
        store.set(StorageKey::AccessToken, "tok").await.unwrap();
        store.set(StorageKey::User, "{\"id\":\"u\"}").await.unwrap();
        store.set(StorageKey::PushToken, "push").await.unwrap();

        store.clear_session().await.unwrap();

        assert!(store.peek(StorageKey::AccessToken).is_none());
        assert!(store.peek(StorageKey::User).is_none());
        assert_eq!(store.peek(StorageKey::PushToken).as_deref(), Some("push"));
    }

    #[tokio::test]
    async fn corrupt_user_blob_is_reported() {
        let store = MemoryStore::new();
        store.set(StorageKey::User, "not json").await.unwrap();
        assert!(matches!(
            store.load_user().await,
            Err(StorageError::CorruptedData(_))
        ));
    }
}
