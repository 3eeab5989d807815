//! Ports the session domain depends on

pub mod gateway;
pub mod platform;
pub mod store;

pub use gateway::AuthGateway;
pub use platform::{
    AppLifecycleSource, AppState, EncryptionBootstrap, EncryptionStatus,
    LifecycleChannel, NoEncryption, NoPushRegistrar, PushRegistrar,
};
pub use store::{MemoryStore, SecureStore, StorageKey};
