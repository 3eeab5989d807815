//! StudyHall session library
//!
//! Client-side authentication lifecycle for the StudyHall learning app:
//! OTP and password sign-in, registration, restoring a stored session at
//! startup, and reacting when the server ends this session because the
//! account signed in on another device.
//!
//! The entry point is [`SessionManager`]. Hosts supply an [`AuthGateway`]
//! (normally [`HttpAuthGateway`]), a [`SecureStore`] and optional platform
//! capabilities, then render from [`SessionStateReader`] snapshots and show
//! [`SessionNotice`]s to the user.
//!
//! Notes
//! - Only one screen receives notices at a time; see [`SessionNotices`].
//! - Test doubles live in `testing` behind the `testing` feature.
#![allow(missing_docs)]

pub mod domains;
pub mod infra;

pub use domains::session::{
    AccessToken, AuthState, EncryptedFileStore, GatewayError,
    GatewayErrorKind, GatewayResult, LifecycleWatch, NoticeSubscription,
    PlatformError, Revalidation, Session, SessionError, SessionManager,
    SessionManagerBuilder, SessionNotice, SessionNotices, SessionResult,
    SessionState, SessionStateReader, SessionTimings, StorageError,
    StorageResult,
};
pub use infra::adapters::HttpAuthGateway;
pub use infra::api_client::ApiClient;
pub use infra::config::SessionConfig;
pub use infra::services::{
    AppLifecycleSource, AppState, AuthGateway, EncryptionBootstrap,
    EncryptionStatus, LifecycleChannel, MemoryStore, NoEncryption,
    NoPushRegistrar, PushRegistrar, SecureStore, StorageKey,
};
#[cfg(any(test, feature = "testing"))]
pub use infra::testing;
