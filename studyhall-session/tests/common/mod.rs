//! Shared harness for session integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use studyhall_model::User;
use studyhall_session::testing::init_test_logging;
use studyhall_session::testing::stubs::StubAuthGateway;
use studyhall_session::{
    AccessToken, MemoryStore, SecureStore, SessionManager,
    SessionManagerBuilder, SessionState,
};

pub const WAIT: Duration = Duration::from_secs(2);

/// A manager wired to a scripted gateway and an inspectable in-memory store.
pub struct Harness {
    pub gateway: Arc<StubAuthGateway>,
    pub store: MemoryStore,
    pub manager: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    pub fn with(
        configure: impl FnOnce(SessionManagerBuilder) -> SessionManagerBuilder,
    ) -> Self {
        Self::build(|store| Arc::new(store), configure)
    }

    /// The manager reaches the inspectable store through `wrap`.
    pub fn wrapping_store(
        wrap: impl FnOnce(MemoryStore) -> Arc<dyn SecureStore>,
    ) -> Self {
        Self::build(wrap, |builder| builder)
    }

    fn build(
        wrap: impl FnOnce(MemoryStore) -> Arc<dyn SecureStore>,
        configure: impl FnOnce(SessionManagerBuilder) -> SessionManagerBuilder,
    ) -> Self {
        init_test_logging();
        let gateway = Arc::new(StubAuthGateway::new());
        let store = MemoryStore::new();
        let builder = SessionManager::builder(gateway.clone())
            .store(wrap(store.clone()))
            .logout_timeout(Duration::from_millis(100))
            .startup_refresh_grace(Duration::from_secs(1));
        let manager = configure(builder).build();
        Self {
            gateway,
            store,
            manager,
        }
    }

    /// Persist a session as a previous app run would have.
    pub async fn seed_session(&self, token: &str, user: &User) {
        self.store
            .save_token(&AccessToken::from(token))
            .await
            .unwrap();
        self.store.save_user(user).await.unwrap();
    }

    /// Wait until the manager state satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> SessionState
    where
        F: FnMut(&SessionState) -> bool,
    {
        tokio::time::timeout(WAIT, self.manager.reader().wait_for(predicate))
            .await
            .expect("state never reached")
    }
}

pub fn student(id: &str) -> User {
    User::new(id)
        .with_name("Asha Verma")
        .with_phone("9999999999")
}

/// Poll until `condition` holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
