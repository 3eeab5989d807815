//! Startup restore: optimistic session, background refresh, offline tolerance

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, eventually, student};
use studyhall_session::testing::stubs::{
    FailingStore, GatewayCall, StaticEncryption,
};
use studyhall_session::{
    AccessToken, GatewayError, PlatformError, SecureStore, SessionNotice,
    StorageKey,
};

/// Record every distinct `initializing` value observed on the state channel
/// until it has been quiet for a while.
fn record_initializing(
    harness: &Harness,
) -> tokio::task::JoinHandle<Vec<bool>> {
    let mut receiver = harness.manager.reader().subscribe();
    tokio::spawn(async move {
        let mut seen = vec![receiver.borrow_and_update().initializing];
        while let Ok(Ok(())) =
            tokio::time::timeout(Duration::from_millis(300), receiver.changed())
                .await
        {
            let initializing = receiver.borrow_and_update().initializing;
            if seen.last() != Some(&initializing) {
                seen.push(initializing);
            }
        }
        seen
    })
}

#[tokio::test]
async fn fresh_install_starts_signed_out() {
    let harness = Harness::new();
    assert!(harness.manager.state().initializing);

    harness.manager.initialize().await;

    let state = harness.manager.state();
    assert!(!state.initializing);
    assert!(!state.is_authenticated());
    assert!(state.user().is_none());
    assert_eq!(
        harness.gateway.call_count(|c| *c == GatewayCall::GetCurrentUser),
        0
    );
}

#[tokio::test]
async fn stored_session_is_refreshed_from_server() {
    let harness = Harness::new();
    harness.seed_session("stored-token", &student("u-1")).await;
    let fresh = student("u-1").with_name("Asha V.");
    harness.gateway.set_current_user(Ok(fresh.clone()));

    harness.manager.initialize().await;

    let state = harness.manager.state();
    assert!(!state.initializing);
    assert!(state.is_authenticated());
    assert_eq!(state.user(), Some(&fresh));
    assert_eq!(harness.store.load_user().await.unwrap(), Some(fresh));
    assert_eq!(
        harness.gateway.attached_token().as_deref(),
        Some("stored-token")
    );
}

#[tokio::test]
async fn terminated_session_at_startup_forces_logout() {
    let harness = Harness::new();
    let mut notices = harness.manager.subscribe_notices();
    harness.seed_session("stale-token", &student("u-1")).await;
    harness
        .gateway
        .set_current_user(Err(GatewayError::session_terminated()));

    harness.manager.initialize().await;

    let state = harness.manager.state();
    assert!(!state.initializing);
    assert!(!state.is_authenticated());
    assert!(state.session_terminated);
    assert!(state.user().is_none());

    assert!(harness.store.peek(StorageKey::AccessToken).is_none());
    assert!(harness.store.peek(StorageKey::User).is_none());
    assert_eq!(harness.gateway.attached_token(), None);
    assert_eq!(notices.try_recv(), Some(SessionNotice::SignedInElsewhere));
    assert_eq!(notices.try_recv(), None);
}

#[tokio::test]
async fn unreachable_server_keeps_cached_session() {
    let harness = Harness::new();
    let cached = student("u-1");
    harness.seed_session("stored-token", &cached).await;
    harness
        .gateway
        .set_current_user(Err(GatewayError::transport("connection refused")));

    harness.manager.initialize().await;

    let state = harness.manager.state();
    assert!(!state.initializing);
    assert!(state.is_authenticated());
    assert!(!state.session_terminated);
    assert_eq!(state.user(), Some(&cached));
}

#[tokio::test]
async fn initializing_clears_once_when_refresh_outlives_grace() {
    let harness = Harness::with(|builder| {
        builder.startup_refresh_grace(Duration::from_millis(50))
    });
    harness.seed_session("stored-token", &student("u-1")).await;
    let gate = harness.gateway.hold_current_user();
    let observed = record_initializing(&harness);

    harness.manager.initialize().await;

    // Startup finished on the cached user while the refresh is parked.
    let state = harness.manager.state();
    assert!(!state.initializing);
    assert_eq!(state.user(), Some(&student("u-1")));

    let fresh = student("u-1").with_email("asha@example.test");
    harness.gateway.set_current_user(Ok(fresh.clone()));
    gate.notify_one();

    let state = harness.wait_for(|s| s.user() == Some(&fresh)).await;
    assert!(!state.initializing);
    assert_eq!(observed.await.unwrap(), vec![true, false]);
}

#[tokio::test]
async fn initializing_clears_once_on_failed_refresh() {
    let harness = Harness::new();
    harness.seed_session("stored-token", &student("u-1")).await;
    harness
        .gateway
        .set_current_user(Err(GatewayError::transport("timeout")));
    let observed = record_initializing(&harness);

    harness.manager.initialize().await;

    assert_eq!(observed.await.unwrap(), vec![true, false]);
}

#[tokio::test]
async fn unreadable_store_starts_signed_out() {
    let harness = Harness::with(|builder| builder.store(Arc::new(FailingStore)));

    harness.manager.initialize().await;

    let state = harness.manager.state();
    assert!(!state.initializing);
    assert!(!state.is_authenticated());
}

#[tokio::test]
async fn token_without_cached_user_is_not_restored() {
    let harness = Harness::new();
    harness
        .store
        .save_token(&AccessToken::from("orphan"))
        .await
        .unwrap();

    harness.manager.initialize().await;

    assert!(!harness.manager.is_authenticated());
    assert!(harness.gateway.calls().is_empty());
}

#[tokio::test]
async fn encryption_bootstrap_outcome_is_recorded() {
    let ready = Harness::with(|builder| {
        builder.encryption(Arc::new(StaticEncryption::ready()))
    });
    ready.manager.initialize().await;
    assert!(ready.manager.state().encryption_ready);

    let failing = Harness::with(|builder| {
        builder.encryption(Arc::new(StaticEncryption::failing(
            PlatformError::Failed("keystore locked".into()),
        )))
    });
    failing.manager.initialize().await;
    let state = failing.manager.state();
    assert!(!state.encryption_ready);
    assert!(!state.initializing);
    let status = failing.manager.encryption_status().unwrap();
    assert!(!status.ready);
    assert!(status.detail.unwrap().contains("keystore locked"));
}

#[tokio::test]
async fn manual_refresh_updates_user() {
    let harness = Harness::new();
    harness.seed_session("stored-token", &student("u-1")).await;
    harness
        .gateway
        .set_current_user(Err(GatewayError::transport("offline")));
    harness.manager.initialize().await;

    let fresh = student("u-1").with_name("Renamed");
    harness.gateway.set_current_user(Ok(fresh.clone()));

    assert_eq!(harness.manager.refresh_current_user().await, Some(fresh));
    eventually(|| {
        harness.gateway.call_count(|c| *c == GatewayCall::GetCurrentUser) == 2
    })
    .await;
}
