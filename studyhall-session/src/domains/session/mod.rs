//! Session domain
//!
//! Authentication state, startup restore, forced logout on sign-in from
//! another device, and the secure persistence of credentials.

pub mod errors;
pub mod lifecycle;
pub mod manager;
pub mod notices;
pub mod security;
pub mod state_types;
pub mod storage;

// Re-export commonly used session types
pub use errors::*;
pub use lifecycle::LifecycleWatch;
pub use manager::{
    Revalidation, SessionManager, SessionManagerBuilder, SessionTimings,
};
pub use notices::{NoticeSubscription, SessionNotice, SessionNotices};
pub use security::AccessToken;
pub use state_types::{
    AuthState, Session, SessionState, SessionStateReader, SessionStateStore,
};
pub use storage::EncryptedFileStore;
