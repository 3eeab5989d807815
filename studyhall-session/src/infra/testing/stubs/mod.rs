pub mod gateway;
pub mod platform;
pub mod store;

pub use gateway::{GatewayCall, StubAuthGateway, grant};
pub use platform::{StaticEncryption, StaticPushRegistrar};
pub use store::{DelayedStore, FailingStore};
