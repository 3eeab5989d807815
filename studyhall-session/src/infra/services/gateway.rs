//! Auth gateway trait
//!
//! This is the runtime-facing contract the session manager uses to talk to
//! the auth API. The server is the authority for identity, OTPs and the
//! single-active-device policy. The HTTP implementation lives in
//! `infra::adapters::http_gateway`; test stubs in `infra::testing::stubs`.

use async_trait::async_trait;
use studyhall_model::{
    LoginGrant, OtpDispatch, OtpPurpose, OtpVerification, RegistrationProfile,
    SessionValidity, User,
};

use crate::domains::session::errors::GatewayResult;
use crate::domains::session::security::AccessToken;

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Request an OTP for `phone`.
    async fn send_otp(
        &self,
        phone: &str,
        purpose: OtpPurpose,
    ) -> GatewayResult<OtpDispatch>;

    /// Confirm phone ownership. Never establishes a session.
    async fn verify_otp(
        &self,
        phone: &str,
        code: &str,
    ) -> GatewayResult<OtpVerification>;

    async fn login_with_otp(
        &self,
        phone: &str,
        code: &str,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant>;

    async fn login_with_password(
        &self,
        identifier: &str,
        secret: &str,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant>;

    async fn register(
        &self,
        profile: &RegistrationProfile,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant>;

    /// Invalidate the session server-side. Best effort.
    async fn logout(&self) -> GatewayResult<()>;

    /// Fetch the signed-in user. Fails with `SESSION_TERMINATED` once a newer
    /// login elsewhere has replaced this session.
    async fn get_current_user(&self) -> GatewayResult<User>;

    /// Lightweight "is my session still valid" check.
    async fn validate_session(&self) -> GatewayResult<SessionValidity>;

    async fn update_fcm_token(&self, token: &str) -> GatewayResult<()>;

    /// Hand the bearer token used for subsequent calls to the transport.
    async fn attach_token(&self, _token: Option<&AccessToken>) {}
}
