//! Session state machine and its watch-backed store
//!
//! Authentication and the current user live in a single enum, so a snapshot
//! can never say "authenticated" without also carrying the user. All writes
//! go through [`SessionStateStore`], which applies each transition as one
//! `watch` update: observers never see half of a transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use studyhall_model::{User, UserPatch};
use tokio::sync::watch;

use crate::domains::session::security::AccessToken;

/// An established login: bearer token plus the profile it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: AccessToken,
    pub user: User,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(access_token: AccessToken, user: User) -> Self {
        Self {
            access_token,
            user,
            established_at: Utc::now(),
        }
    }
}

/// Authentication state machine
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthState {
    /// No authenticated user
    #[default]
    Unauthenticated,

    /// A session is established (possibly restored optimistically from storage)
    Authenticated { session: Session },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated { session } => Some(session),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|session| &session.user)
    }
}

/// Snapshot of everything the UI renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub auth: AuthState,
    /// True until the startup sequence has finished.
    pub initializing: bool,
    /// Set by a server-driven forced logout until the user acknowledges it.
    pub session_terminated: bool,
    pub encryption_ready: bool,
    /// Bumped on every authentication change; async responses captured under
    /// an older epoch are discarded.
    pub epoch: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            auth: AuthState::Unauthenticated,
            initializing: true,
            session_terminated: false,
            encryption_ready: false,
            epoch: 0,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn user(&self) -> Option<&User> {
        self.auth.user()
    }

    pub fn session(&self) -> Option<&Session> {
        self.auth.session()
    }

    /// Whether a response captured at `epoch` may still be applied.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.is_authenticated()
    }
}

/// Thread-safe session state store using a watch channel
#[derive(Clone, Debug)]
pub struct SessionStateStore {
    sender: Arc<watch::Sender<SessionState>>,
    receiver: watch::Receiver<SessionState>,
}

impl SessionStateStore {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(SessionState::default());
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Get the current state
    pub fn current(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    /// Access state without cloning
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        f(&self.receiver.borrow())
    }

    pub fn is_authenticated(&self) -> bool {
        self.with_state(SessionState::is_authenticated)
    }

    /// Epoch of the current session, or `None` when unauthenticated.
    pub fn authenticated_epoch(&self) -> Option<u64> {
        self.with_state(|state| {
            state.is_authenticated().then_some(state.epoch)
        })
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.receiver.clone()
    }

    /// Read-only handle for consumers that must not mutate the session.
    pub fn reader(&self) -> SessionStateReader {
        SessionStateReader {
            receiver: self.receiver.clone(),
        }
    }

    pub fn set_initializing(&self, initializing: bool) -> bool {
        self.sender.send_if_modified(|state| {
            if state.initializing == initializing {
                return false;
            }
            state.initializing = initializing;
            true
        })
    }

    pub fn set_encryption_ready(&self, ready: bool) {
        self.sender.send_if_modified(|state| {
            if state.encryption_ready == ready {
                return false;
            }
            state.encryption_ready = ready;
            true
        });
    }

    /// Transition to authenticated. Returns the epoch of the new session.
    pub fn authenticate(&self, session: Session) -> u64 {
        let mut epoch = 0;
        self.sender.send_modify(|state| {
            state.auth = AuthState::Authenticated { session };
            state.session_terminated = false;
            state.epoch += 1;
            epoch = state.epoch;
        });
        epoch
    }

    /// Replace the user of the session established at `epoch`.
    ///
    /// Returns false (and leaves state untouched) when that session has
    /// since been replaced or cleared.
    pub fn replace_user_if_current(&self, epoch: u64, user: User) -> bool {
        self.sender.send_if_modified(|state| {
            if !state.accepts(epoch) {
                return false;
            }
            match &mut state.auth {
                AuthState::Authenticated { session } => {
                    session.user = user;
                    true
                }
                AuthState::Unauthenticated => false,
            }
        })
    }

    /// Shallow-merge a patch into the current user. Returns the merged user
    /// with the epoch it belongs to, or `None` when unauthenticated.
    pub fn merge_user(&self, patch: UserPatch) -> Option<(u64, User)> {
        let mut merged = None;
        self.sender.send_if_modified(|state| match &mut state.auth {
            AuthState::Authenticated { session } => {
                session.user.merge(patch);
                merged = Some((state.epoch, session.user.clone()));
                true
            }
            AuthState::Unauthenticated => false,
        });
        merged
    }

    /// Forced-logout transition.
    ///
    /// With `Some(epoch)` the transition only applies to that session. There
    /// must be a signed-in session to end, so a repeat before the user signs
    /// in again changes nothing. Returns the new epoch when state changed.
    pub fn terminate(&self, epoch: Option<u64>) -> Option<u64> {
        let mut terminated = None;
        self.sender.send_if_modified(|state| {
            if !state.is_authenticated() {
                return false;
            }
            if let Some(epoch) = epoch
                && state.epoch != epoch
            {
                return false;
            }
            state.auth = AuthState::Unauthenticated;
            state.session_terminated = true;
            state.epoch += 1;
            terminated = Some(state.epoch);
            true
        });
        terminated
    }

    /// Clear the one-time "signed in elsewhere" flag.
    pub fn acknowledge_termination(&self) -> bool {
        self.sender.send_if_modified(|state| {
            if !state.session_terminated {
                return false;
            }
            state.session_terminated = false;
            true
        })
    }

    /// Log out the current user. Returns the new epoch.
    pub fn logout(&self) -> u64 {
        let mut epoch = 0;
        self.sender.send_modify(|state| {
            state.auth = AuthState::Unauthenticated;
            state.session_terminated = false;
            state.epoch += 1;
            epoch = state.epoch;
        });
        epoch
    }

    /// Current epoch, authenticated or not.
    pub fn epoch(&self) -> u64 {
        self.with_state(|state| state.epoch)
    }

    /// Whether the session established at `epoch` is still the live one.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.with_state(|state| state.accepts(epoch))
    }
}

impl Default for SessionStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the session state.
#[derive(Clone, Debug)]
pub struct SessionStateReader {
    receiver: watch::Receiver<SessionState>,
}

impl SessionStateReader {
    pub fn current(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_authenticated()
    }

    pub fn is_initializing(&self) -> bool {
        self.receiver.borrow().initializing
    }

    pub fn user(&self) -> Option<User> {
        self.receiver.borrow().user().cloned()
    }

    /// Fresh receiver for change notifications.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.receiver.clone()
    }

    /// Wait until the state satisfies `predicate`, returning that snapshot.
    pub async fn wait_for<F>(&self, mut predicate: F) -> SessionState
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut receiver = self.receiver.clone();
        let matched = receiver
            .wait_for(|state| predicate(state))
            .await
            .map(|state| state.clone());
        match matched {
            Ok(state) => state,
            // Sender dropped: nothing will change any more.
            Err(_) => receiver.borrow().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session::new(AccessToken::from("token"), User::new(id))
    }

    #[test]
    fn starts_initializing_and_signed_out() {
        let store = SessionStateStore::new();
        let state = store.current();
        assert!(state.initializing);
        assert!(!state.is_authenticated());
        assert!(state.user().is_none());
    }

    #[test]
    fn authenticate_bumps_epoch_and_clears_termination() {
        let store = SessionStateStore::new();
        store.authenticate(session("u-0"));
        assert!(store.terminate(None).is_some());
        let epoch = store.authenticate(session("u-1"));

        let state = store.current();
        assert_eq!(state.epoch, epoch);
        assert!(!state.session_terminated);
        assert_eq!(state.user().map(|u| u.id.as_str()), Some("u-1"));
    }

    #[test]
    fn terminate_is_idempotent_until_acknowledged() {
        let store = SessionStateStore::new();
        store.authenticate(session("u-1"));

        assert!(store.terminate(None).is_some());
        let after_first = store.current();
        assert_eq!(store.terminate(None), None);
        assert_eq!(store.current(), after_first);

        assert!(store.acknowledge_termination());
        assert!(!store.current().session_terminated);
    }

    #[test]
    fn stale_epoch_is_rejected() {
        let store = SessionStateStore::new();
        let epoch = store.authenticate(session("u-1"));
        store.logout();

        assert!(!store.replace_user_if_current(epoch, User::new("u-1")));
        assert_eq!(store.terminate(Some(epoch)), None);
        assert!(!store.is_authenticated());
        assert!(!store.current().session_terminated);
    }

    #[test]
    fn merge_user_requires_a_session() {
        let store = SessionStateStore::new();
        assert!(store.merge_user(UserPatch::new().name("x")).is_none());

        store.authenticate(session("u-1"));
        let epoch = store.authenticated_epoch().unwrap();
        let (merged_at, merged) =
            store.merge_user(UserPatch::new().name("Asha")).unwrap();
        assert_eq!(merged_at, epoch);
        assert_eq!(merged.name.as_deref(), Some("Asha"));
    }

    #[test]
    fn terminate_needs_a_signed_in_session() {
        let store = SessionStateStore::new();

        assert_eq!(store.terminate(None), None);
        assert!(!store.current().session_terminated);

        let epoch = store.authenticate(session("u-1"));
        assert!(store.is_current(epoch));
        assert_eq!(store.terminate(None), Some(epoch + 1));
        assert!(!store.is_current(epoch));
    }
}
