use async_trait::async_trait;

use crate::domains::session::errors::PlatformError;
use crate::infra::services::platform::{
    EncryptionBootstrap, EncryptionStatus, PushRegistrar,
};

/// Push registrar that always answers the same way.
#[derive(Debug, Clone)]
pub struct StaticPushRegistrar {
    result: Result<Option<String>, PlatformError>,
}

impl StaticPushRegistrar {
    pub fn token(token: &str) -> Self {
        Self {
            result: Ok(Some(token.to_string())),
        }
    }

    pub fn failing(err: PlatformError) -> Self {
        Self { result: Err(err) }
    }
}

#[async_trait]
impl PushRegistrar for StaticPushRegistrar {
    async fn acquire_token(&self) -> Result<Option<String>, PlatformError> {
        self.result.clone()
    }
}

/// Encryption bootstrap that always answers the same way.
#[derive(Debug, Clone)]
pub struct StaticEncryption {
    result: Result<EncryptionStatus, PlatformError>,
}

impl StaticEncryption {
    pub fn ready() -> Self {
        Self {
            result: Ok(EncryptionStatus::ready()),
        }
    }

    pub fn failing(err: PlatformError) -> Self {
        Self { result: Err(err) }
    }
}

#[async_trait]
impl EncryptionBootstrap for StaticEncryption {
    async fn initialize(&self) -> Result<EncryptionStatus, PlatformError> {
        self.result.clone()
    }
}
