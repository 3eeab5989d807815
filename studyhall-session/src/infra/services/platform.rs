//! Optional platform capabilities
//!
//! Push registration, storage-encryption bootstrap and app lifecycle events
//! differ per host. Each is a trait with a null implementation so the
//! session manager never probes for presence at runtime.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::domains::session::errors::PlatformError;

/// Obtains a push-notification token for this device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushRegistrar: Send + Sync {
    /// `Ok(None)` when the platform has no token to offer yet.
    async fn acquire_token(&self) -> Result<Option<String>, PlatformError>;
}

/// Push registrar for hosts without push support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPushRegistrar;

#[async_trait]
impl PushRegistrar for NoPushRegistrar {
    async fn acquire_token(&self) -> Result<Option<String>, PlatformError> {
        Err(PlatformError::Unsupported)
    }
}

/// Outcome of the storage-encryption bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptionStatus {
    pub ready: bool,
    pub detail: Option<String>,
}

impl EncryptionStatus {
    pub fn ready() -> Self {
        Self {
            ready: true,
            detail: None,
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            ready: false,
            detail: Some(detail.into()),
        }
    }
}

#[async_trait]
pub trait EncryptionBootstrap: Send + Sync {
    async fn initialize(&self) -> Result<EncryptionStatus, PlatformError>;
}

/// Bootstrap for hosts without an encryption layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncryption;

#[async_trait]
impl EncryptionBootstrap for NoEncryption {
    async fn initialize(&self) -> Result<EncryptionStatus, PlatformError> {
        Ok(EncryptionStatus::unavailable("encryption not configured"))
    }
}

/// Foreground state of the host app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Active,
    Inactive,
    Background,
}

impl AppState {
    /// Background/inactive to active.
    pub fn is_foregrounding(previous: AppState, next: AppState) -> bool {
        previous != AppState::Active && next == AppState::Active
    }
}

/// Source of app lifecycle transitions.
pub trait AppLifecycleSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<AppState>;

    fn current(&self) -> AppState;
}

/// In-process lifecycle source fed by the host through [`emit`](Self::emit).
#[derive(Debug, Clone)]
pub struct LifecycleChannel {
    sender: broadcast::Sender<AppState>,
    current: Arc<Mutex<AppState>>,
}

impl LifecycleChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            current: Arc::new(Mutex::new(AppState::Active)),
        }
    }

    /// Record a transition and fan it out to watchers.
    pub fn emit(&self, state: AppState) {
        *self.current.lock() = state;
        // No receivers is fine: nobody is watching yet.
        let _ = self.sender.send(state);
    }
}

impl Default for LifecycleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AppLifecycleSource for LifecycleChannel {
    fn subscribe(&self) -> broadcast::Receiver<AppState> {
        self.sender.subscribe()
    }

    fn current(&self) -> AppState {
        *self.current.lock()
    }
}
