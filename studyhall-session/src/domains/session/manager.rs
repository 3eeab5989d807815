use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use studyhall_model::{
    LoginGrant, OtpDispatch, OtpPurpose, RegistrationProfile, User, UserPatch,
};
use tokio::task::JoinHandle;

use crate::domains::session::errors::{SessionError, SessionResult};
use crate::domains::session::lifecycle::LifecycleWatch;
use crate::domains::session::notices::{
    NoticeSubscription, SessionNotice, SessionNotices,
};
use crate::domains::session::security::AccessToken;
use crate::domains::session::state_types::{
    Session, SessionState, SessionStateReader, SessionStateStore,
};
use crate::domains::session::storage::EncryptedFileStore;
use crate::infra::adapters::HttpAuthGateway;
use crate::infra::api_client::ApiClient;
use crate::infra::config::SessionConfig;
use crate::infra::services::gateway::AuthGateway;
use crate::infra::services::platform::{
    AppLifecycleSource, AppState, EncryptionBootstrap, EncryptionStatus,
    NoEncryption, NoPushRegistrar, PushRegistrar,
};
use crate::infra::services::store::{MemoryStore, SecureStore, StorageKey};

/// Timeouts the manager applies on top of the transport's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Upper bound on the best-effort remote logout.
    pub logout_timeout: Duration,
    /// How long `initialize` waits for the background user refresh.
    pub startup_refresh_grace: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            logout_timeout: Duration::from_secs(2),
            startup_refresh_grace: Duration::from_secs(10),
        }
    }
}

impl From<&SessionConfig> for SessionTimings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            logout_timeout: config.logout_timeout(),
            startup_refresh_grace: config.startup_refresh_grace(),
        }
    }
}

/// Outcome of a session re-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// The server still accepts the session.
    Valid,
    /// The server ended the session and the forced logout ran.
    Terminated,
    /// The session changed while the check was in flight; result ignored.
    Stale,
    /// Nobody is signed in.
    Skipped,
    /// The check failed; the session is kept.
    Unreachable,
}

/// Clears `initializing` however startup exits.
struct InitializingGuard {
    state: SessionStateStore,
}

impl Drop for InitializingGuard {
    fn drop(&mut self) {
        self.state.set_initializing(false);
    }
}

/// Session lifecycle manager
///
/// Owns the signed-in user, the persisted credentials and the reaction to
/// server-side session termination. Cloning is cheap and every clone drives
/// the same session.
///
/// ## Startup
/// `initialize` restores a stored token and cached user optimistically, then
/// confirms them with the server in the background. A server answer of
/// `SESSION_TERMINATED` runs the forced logout; any other failure keeps the
/// cached session so the app stays usable offline.
///
/// ## Forced logout
/// The server allows one active session per account. When it reports that a
/// newer login replaced ours, local state, stored credentials and the bearer
/// token are cleared and a single [`SessionNotice::SignedInElsewhere`] is
/// published.
///
/// ## Stale responses
/// Every authentication change bumps an epoch. Refresh and validation
/// results captured under an older epoch are discarded.
#[derive(Clone)]
pub struct SessionManager {
    gateway: Arc<dyn AuthGateway>,
    store: Arc<dyn SecureStore>,
    push: Arc<dyn PushRegistrar>,
    encryption: Arc<dyn EncryptionBootstrap>,
    state: SessionStateStore,
    notices: SessionNotices,
    encryption_status: Arc<Mutex<Option<EncryptionStatus>>>,
    started: Arc<AtomicBool>,
    /// Serializes stored-credential writes with the clears that end a
    /// session, so a cleared store stays cleared.
    credentials: Arc<tokio::sync::Mutex<()>>,
    timings: SessionTimings,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state.current())
            .field("timings", &self.timings)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Builder for [`SessionManager`]. Capabilities default to their null
/// implementations and the store to an in-memory one.
pub struct SessionManagerBuilder {
    gateway: Arc<dyn AuthGateway>,
    store: Arc<dyn SecureStore>,
    push: Arc<dyn PushRegistrar>,
    encryption: Arc<dyn EncryptionBootstrap>,
    timings: SessionTimings,
}

impl std::fmt::Debug for SessionManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManagerBuilder")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl SessionManagerBuilder {
    pub fn store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.store = store;
        self
    }

    pub fn push_registrar(mut self, push: Arc<dyn PushRegistrar>) -> Self {
        self.push = push;
        self
    }

    pub fn encryption(
        mut self,
        encryption: Arc<dyn EncryptionBootstrap>,
    ) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn timings(mut self, timings: SessionTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn logout_timeout(mut self, timeout: Duration) -> Self {
        self.timings.logout_timeout = timeout;
        self
    }

    pub fn startup_refresh_grace(mut self, grace: Duration) -> Self {
        self.timings.startup_refresh_grace = grace;
        self
    }

    pub fn build(self) -> SessionManager {
        SessionManager {
            gateway: self.gateway,
            store: self.store,
            push: self.push,
            encryption: self.encryption,
            state: SessionStateStore::new(),
            notices: SessionNotices::new(),
            encryption_status: Arc::new(Mutex::new(None)),
            started: Arc::new(AtomicBool::new(false)),
            credentials: Arc::new(tokio::sync::Mutex::new(())),
            timings: self.timings,
        }
    }
}

impl SessionManager {
    pub fn builder(gateway: Arc<dyn AuthGateway>) -> SessionManagerBuilder {
        SessionManagerBuilder {
            gateway,
            store: Arc::new(MemoryStore::new()),
            push: Arc::new(NoPushRegistrar),
            encryption: Arc::new(NoEncryption),
            timings: SessionTimings::default(),
        }
    }

    /// Builder wired with the HTTP gateway and the encrypted file store.
    /// Platform capabilities can still be set on the returned builder.
    pub fn builder_from_config(
        config: &SessionConfig,
    ) -> SessionResult<SessionManagerBuilder> {
        let api = ApiClient::new(&config.server_url, config.request_timeout())
            .map_err(|e| SessionError::Config(format!("{:#}", e)))?;
        let store = EncryptedFileStore::new(config.data_dir()?);
        Ok(Self::builder(Arc::new(HttpAuthGateway::new(api)))
            .store(Arc::new(store))
            .timings(SessionTimings::from(config)))
    }

    /// Restore the persisted session. Runs once per process; later calls
    /// are ignored.
    pub async fn initialize(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("[SessionManager] initialize called twice, ignoring");
            return;
        }
        let _initializing = InitializingGuard {
            state: self.state.clone(),
        };
        info!("[SessionManager] Starting session restore");

        self.bootstrap_encryption().await;

        let token = match self.store.load_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("[SessionManager] Failed to read stored token: {}", e);
                None
            }
        };
        let user = match self.store.load_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!("[SessionManager] Failed to read cached user: {}", e);
                None
            }
        };

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            (None, None) => {
                info!("[SessionManager] No stored session");
                return;
            }
            _ => {
                warn!(
                    "[SessionManager] Incomplete stored session, starting signed out"
                );
                return;
            }
        };

        info!(
            "[SessionManager] Restored cached session for user {}",
            user.id
        );
        let epoch = self.state.authenticate(Session::new(token.clone(), user));
        {
            let _credentials = self.credentials.lock().await;
            if self.state.is_current(epoch) {
                self.gateway.attach_token(Some(&token)).await;
            }
        }

        let manager = self.clone();
        let mut refresh =
            tokio::spawn(async move { manager.refresh_for_epoch(epoch).await });
        let grace = self.timings.startup_refresh_grace;
        match tokio::time::timeout(grace, &mut refresh).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!("[SessionManager] User refresh task failed: {}", e);
            }
            Err(_) => {
                info!(
                    "[SessionManager] User refresh pending after {:?}, continuing in background",
                    grace
                );
            }
        }
    }

    async fn bootstrap_encryption(&self) {
        let status = match self.encryption.initialize().await {
            Ok(status) => status,
            Err(e) => {
                warn!("[SessionManager] Encryption bootstrap failed: {}", e);
                EncryptionStatus::unavailable(e.to_string())
            }
        };
        debug!("[SessionManager] Encryption ready: {}", status.ready);
        self.state.set_encryption_ready(status.ready);
        *self.encryption_status.lock() = Some(status);
    }

    /// Re-fetch the signed-in user from the server.
    ///
    /// Returns the fresh user, or `None` when signed out, when the request
    /// failed, or when the session changed while it was in flight.
    pub async fn refresh_current_user(&self) -> Option<User> {
        let epoch = self.state.authenticated_epoch()?;
        self.refresh_for_epoch(epoch).await
    }

    async fn refresh_for_epoch(&self, epoch: u64) -> Option<User> {
        match self.gateway.get_current_user().await {
            Ok(user) => {
                if !self.state.replace_user_if_current(epoch, user.clone()) {
                    debug!("[SessionManager] Discarding stale user refresh");
                    return None;
                }
                self.persist_user(epoch, &user).await;
                debug!("[SessionManager] Refreshed user {}", user.id);
                Some(user)
            }
            Err(e) if e.is_session_terminated() => {
                self.terminate(Some(epoch)).await;
                None
            }
            Err(e) => {
                warn!(
                    "[SessionManager] User refresh failed, keeping cached session: {}",
                    e
                );
                None
            }
        }
    }

    /// Write the cached user unless the session at `epoch` has ended.
    async fn persist_user(&self, epoch: u64, user: &User) {
        let _credentials = self.credentials.lock().await;
        if !self.state.is_current(epoch) {
            debug!("[SessionManager] Session ended, not persisting user");
            return;
        }
        if let Err(e) = self.store.save_user(user).await {
            warn!("[SessionManager] Failed to persist user: {}", e);
        }
    }

    /// Server-driven logout: another device signed in with this account.
    ///
    /// Repeated calls before the user acknowledges are no-ops. Returns
    /// whether the transition ran.
    pub async fn force_logout(&self) -> bool {
        self.terminate(None).await
    }

    async fn terminate(&self, epoch: Option<u64>) -> bool {
        let Some(terminated_at) = self.state.terminate(epoch) else {
            debug!("[SessionManager] Forced logout already applied or stale");
            return false;
        };
        warn!(
            "[SessionManager] Session terminated: signed in on another device"
        );
        self.notices.publish(SessionNotice::SignedInElsewhere);

        let _credentials = self.credentials.lock().await;
        // A login that raced in after the transition owns the credentials.
        if self.state.epoch() != terminated_at {
            return true;
        }
        self.gateway.attach_token(None).await;
        if let Err(e) = self.store.clear_session().await {
            warn!("[SessionManager] Failed to clear stored session: {}", e);
        }
        true
    }

    /// Clear the "signed in elsewhere" flag once the user has seen it.
    pub fn acknowledge_termination(&self) {
        if self.state.acknowledge_termination() {
            debug!("[SessionManager] Session termination acknowledged");
        }
    }

    /// Ask the server whether the current session is still valid.
    pub async fn revalidate_session(&self) -> Revalidation {
        let Some(epoch) = self.state.authenticated_epoch() else {
            return Revalidation::Skipped;
        };

        match self.gateway.validate_session().await {
            Ok(validity) if validity.valid => return Revalidation::Valid,
            Ok(_) => debug!("[SessionManager] Server reports session invalid"),
            Err(e) if e.is_session_terminated() => {}
            Err(e) => {
                warn!("[SessionManager] Session validation failed: {}", e);
                return Revalidation::Unreachable;
            }
        }

        if self.terminate(Some(epoch)).await {
            Revalidation::Terminated
        } else {
            Revalidation::Stale
        }
    }

    /// React to an app lifecycle transition. Returning to the foreground
    /// while signed in triggers a background re-validation.
    pub fn handle_app_state_change(
        &self,
        previous: AppState,
        next: AppState,
    ) -> Option<JoinHandle<Revalidation>> {
        if !AppState::is_foregrounding(previous, next)
            || !self.state.is_authenticated()
        {
            return None;
        }
        debug!("[SessionManager] App foregrounded, re-validating session");
        let manager = self.clone();
        Some(tokio::spawn(
            async move { manager.revalidate_session().await },
        ))
    }

    /// Re-validate on every return to the foreground until the returned
    /// guard is dropped.
    pub fn watch_lifecycle(
        &self,
        source: &dyn AppLifecycleSource,
    ) -> LifecycleWatch {
        LifecycleWatch::spawn(
            self.clone(),
            source.subscribe(),
            source.current(),
        )
    }

    async fn acquire_push_token(&self) -> Option<String> {
        match self.push.acquire_token().await {
            Ok(Some(token)) => {
                if let Err(e) =
                    self.store.set(StorageKey::PushToken, &token).await
                {
                    warn!(
                        "[SessionManager] Failed to persist push token: {}",
                        e
                    );
                }
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("[SessionManager] Continuing without push token: {}", e);
                None
            }
        }
    }

    async fn establish(&self, grant: LoginGrant) -> User {
        if grant.previous_session_terminated {
            info!("[SessionManager] Login ended a session on another device");
        }
        let token = AccessToken::from(grant.token);
        let user = grant.user;

        let epoch = self
            .state
            .authenticate(Session::new(token.clone(), user.clone()));
        info!("[SessionManager] Signed in as {}", user.id);

        let _credentials = self.credentials.lock().await;
        if !self.state.is_current(epoch) {
            debug!("[SessionManager] Session ended before it was stored");
            return user;
        }
        self.gateway.attach_token(Some(&token)).await;
        if let Err(e) = self.store.save_token(&token).await {
            warn!("[SessionManager] Failed to persist token: {}", e);
        }
        if let Err(e) = self.store.save_user(&user).await {
            warn!("[SessionManager] Failed to persist user: {}", e);
        }
        user
    }

    /// Sign in with a phone OTP. Errors carry the server's code so the OTP
    /// screen can tell an expired code from a wrong one.
    pub async fn login_with_otp(
        &self,
        phone: &str,
        code: &str,
    ) -> SessionResult<User> {
        let push_token = self.acquire_push_token().await;
        match self
            .gateway
            .login_with_otp(phone, code, push_token.as_deref())
            .await
        {
            Ok(grant) => Ok(self.establish(grant).await),
            Err(e) => {
                warn!("[SessionManager] OTP login failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Sign in with phone/email and password. Failures are shown to the user
    /// as an alert.
    pub async fn login_with_password(
        &self,
        identifier: &str,
        secret: &str,
    ) -> bool {
        let push_token = self.acquire_push_token().await;
        match self
            .gateway
            .login_with_password(identifier, secret, push_token.as_deref())
            .await
        {
            Ok(grant) => {
                self.establish(grant).await;
                true
            }
            Err(e) => {
                warn!("[SessionManager] Password login failed: {}", e);
                self.notices.publish(SessionNotice::alert(
                    "Login failed",
                    e.user_message(),
                ));
                false
            }
        }
    }

    pub async fn register(&self, profile: &RegistrationProfile) -> bool {
        let push_token = self.acquire_push_token().await;
        match self.gateway.register(profile, push_token.as_deref()).await {
            Ok(grant) => {
                self.establish(grant).await;
                true
            }
            Err(e) => {
                warn!("[SessionManager] Registration failed: {}", e);
                self.notices.publish(SessionNotice::alert(
                    "Registration failed",
                    e.user_message(),
                ));
                false
            }
        }
    }

    /// Request an OTP. A returned `otp` is only a testing aid.
    pub async fn send_otp(
        &self,
        phone: &str,
        purpose: OtpPurpose,
    ) -> SessionResult<OtpDispatch> {
        self.gateway.send_otp(phone, purpose).await.map_err(|e| {
            warn!("[SessionManager] Sending {} OTP failed: {}", purpose, e);
            SessionError::from(e)
        })
    }

    /// Check an OTP without signing in.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> bool {
        match self.gateway.verify_otp(phone, code).await {
            Ok(verification) => verification.is_verified(),
            Err(e) => {
                warn!("[SessionManager] OTP verification failed: {}", e);
                false
            }
        }
    }

    /// Sign out. Local state and stored credentials are cleared even when
    /// the server cannot be reached.
    pub async fn logout(&self) {
        let epoch = self.state.logout();
        {
            let _credentials = self.credentials.lock().await;
            if self.state.epoch() == epoch
                && let Err(e) = self.store.clear_session().await
            {
                warn!(
                    "[SessionManager] Failed to clear stored session: {}",
                    e
                );
            }
        }

        let timeout = self.timings.logout_timeout;
        match tokio::time::timeout(timeout, self.gateway.logout()).await {
            Ok(Ok(())) => debug!("[SessionManager] Remote logout complete"),
            Ok(Err(e)) => warn!("[SessionManager] Remote logout failed: {}", e),
            Err(_) => warn!(
                "[SessionManager] Remote logout timed out after {:?}",
                timeout
            ),
        }

        let _credentials = self.credentials.lock().await;
        if self.state.epoch() == epoch {
            self.gateway.attach_token(None).await;
        }
        info!("[SessionManager] Signed out");
    }

    /// Merge local profile edits into the signed-in user and persist them.
    /// Does nothing while signed out.
    pub async fn update_local_user(&self, patch: UserPatch) -> bool {
        let Some((epoch, user)) = self.state.merge_user(patch) else {
            debug!("[SessionManager] Ignoring user update while signed out");
            return false;
        };
        self.persist_user(epoch, &user).await;
        true
    }

    /// Remember a new push token and tell the server when signed in.
    pub async fn update_fcm_token(&self, token: &str) {
        if let Err(e) = self.store.set(StorageKey::PushToken, token).await {
            warn!("[SessionManager] Failed to persist push token: {}", e);
        }
        if !self.state.is_authenticated() {
            return;
        }
        if let Err(e) = self.gateway.update_fcm_token(token).await {
            warn!("[SessionManager] Failed to register push token: {}", e);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn reader(&self) -> SessionStateReader {
        self.state.reader()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.with_state(|state| state.user().cloned())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Result of the encryption bootstrap, once `initialize` has run it.
    pub fn encryption_status(&self) -> Option<EncryptionStatus> {
        self.encryption_status.lock().clone()
    }

    pub fn notices(&self) -> &SessionNotices {
        &self.notices
    }

    /// Shorthand for `notices().subscribe()`.
    pub fn subscribe_notices(&self) -> NoticeSubscription {
        self.notices.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::session::errors::{GatewayError, PlatformError};
    use crate::infra::services::platform::MockPushRegistrar;
    use crate::infra::testing::stubs::{GatewayCall, StubAuthGateway, grant};
    use studyhall_model::AuthErrorCode;

    fn manager_with(
        gateway: Arc<StubAuthGateway>,
        push: MockPushRegistrar,
    ) -> SessionManager {
        SessionManager::builder(gateway)
            .push_registrar(Arc::new(push))
            .build()
    }

    #[tokio::test]
    async fn denied_push_permission_still_logs_in() {
        let gateway = Arc::new(StubAuthGateway::new());
        gateway.set_login_with_otp(Ok(grant("tok", User::new("u-1"))));
        let mut push = MockPushRegistrar::new();
        push.expect_acquire_token()
            .times(1)
            .returning(|| Err(PlatformError::PermissionDenied));

        let manager = manager_with(gateway.clone(), push);
        let user =
            manager.login_with_otp("9999999999", "123456").await.unwrap();

        assert_eq!(user.id.as_str(), "u-1");
        assert!(manager.is_authenticated());
        assert!(gateway.calls().contains(&GatewayCall::LoginWithOtp {
            phone: "9999999999".into(),
            code: "123456".into(),
            push_token: None,
        }));
    }

    #[tokio::test]
    async fn acquired_push_token_is_sent_and_stored() {
        let gateway = Arc::new(StubAuthGateway::new());
        gateway.set_login_with_password(Ok(grant("tok", User::new("u-1"))));
        let mut push = MockPushRegistrar::new();
        push.expect_acquire_token()
            .times(1)
            .returning(|| Ok(Some("push-1".to_string())));
        let store = MemoryStore::new();

        let manager = SessionManager::builder(gateway.clone())
            .push_registrar(Arc::new(push))
            .store(Arc::new(store.clone()))
            .build();

        assert!(manager.login_with_password("a@b.test", "pw").await);
        assert_eq!(store.peek(StorageKey::PushToken).as_deref(), Some("push-1"));
        assert!(gateway.calls().contains(&GatewayCall::LoginWithPassword {
            identifier: "a@b.test".into(),
            push_token: Some("push-1".into()),
        }));
    }

    #[tokio::test]
    async fn failed_otp_login_keeps_state_and_returns_code() {
        let gateway = Arc::new(StubAuthGateway::new());
        gateway.set_login_with_otp(Err(GatewayError::rejected(
            Some(AuthErrorCode::InvalidOtp),
            "Invalid OTP",
        )));
        let mut push = MockPushRegistrar::new();
        push.expect_acquire_token().returning(|| Ok(None));

        let manager = manager_with(gateway, push);
        let before = manager.state();
        let err = manager
            .login_with_otp("9999999999", "000000")
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(&AuthErrorCode::InvalidOtp));
        assert_eq!(manager.state(), before);
    }

    #[tokio::test]
    async fn second_initialize_is_ignored() {
        let gateway = Arc::new(StubAuthGateway::new());
        let manager = SessionManager::builder(gateway).build();

        manager.initialize().await;
        assert!(!manager.state().initializing);
        assert!(manager.encryption_status().is_some());

        manager.initialize().await;
        assert!(!manager.state().initializing);
    }

    #[tokio::test]
    async fn foregrounding_while_signed_out_does_nothing() {
        let gateway = Arc::new(StubAuthGateway::new());
        let manager = SessionManager::builder(gateway.clone()).build();

        assert!(
            manager
                .handle_app_state_change(AppState::Background, AppState::Active)
                .is_none()
        );
        assert_eq!(manager.revalidate_session().await, Revalidation::Skipped);
        assert!(gateway.calls().is_empty());
    }
}
