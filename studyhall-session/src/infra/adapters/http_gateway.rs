//! [`AuthGateway`] over the StudyHall REST API.

use async_trait::async_trait;
use log::debug;
use studyhall_model::{
    CurrentUser, FcmTokenRequest, LoginGrant, OtpDispatch, OtpLoginRequest,
    OtpPurpose, OtpVerification, PasswordLoginRequest, RegisterRequest,
    RegistrationProfile, SendOtpRequest, SessionValidity, User,
    VerifyOtpRequest,
};

use crate::domains::session::errors::GatewayResult;
use crate::domains::session::security::AccessToken;
use crate::infra::api_client::ApiClient;
use crate::infra::services::gateway::AuthGateway;

pub mod routes {
    pub const SEND_OTP: &str = "/auth/send-otp";
    pub const VERIFY_OTP: &str = "/auth/verify-otp";
    pub const LOGIN_OTP: &str = "/auth/login-otp";
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const LOGOUT: &str = "/auth/logout";
    pub const ME: &str = "/auth/me";
    pub const VALIDATE_SESSION: &str = "/auth/validate-session";
    pub const FCM_TOKEN: &str = "/auth/fcm-token";
}

#[derive(Debug, Clone)]
pub struct HttpAuthGateway {
    api: ApiClient,
}

impl HttpAuthGateway {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn send_otp(
        &self,
        phone: &str,
        purpose: OtpPurpose,
    ) -> GatewayResult<OtpDispatch> {
        let request = SendOtpRequest {
            phone: phone.to_string(),
            purpose,
        };
        self.api.post(routes::SEND_OTP, &request).await
    }

    async fn verify_otp(
        &self,
        phone: &str,
        code: &str,
    ) -> GatewayResult<OtpVerification> {
        let request = VerifyOtpRequest {
            phone: phone.to_string(),
            otp: code.to_string(),
        };
        self.api.post(routes::VERIFY_OTP, &request).await
    }

    async fn login_with_otp(
        &self,
        phone: &str,
        code: &str,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant> {
        let request = OtpLoginRequest {
            phone: phone.to_string(),
            otp: code.to_string(),
            fcm_token: push_token.map(str::to_string),
        };
        self.api.post(routes::LOGIN_OTP, &request).await
    }

    async fn login_with_password(
        &self,
        identifier: &str,
        secret: &str,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant> {
        let request = PasswordLoginRequest {
            identifier: identifier.to_string(),
            password: secret.to_string(),
            fcm_token: push_token.map(str::to_string),
        };
        self.api.post(routes::LOGIN, &request).await
    }

    async fn register(
        &self,
        profile: &RegistrationProfile,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant> {
        let request = RegisterRequest {
            profile,
            fcm_token: push_token,
        };
        self.api.post(routes::REGISTER, &request).await
    }

    async fn logout(&self) -> GatewayResult<()> {
        self.api.post_empty(routes::LOGOUT).await
    }

    async fn get_current_user(&self) -> GatewayResult<User> {
        let reply: CurrentUser = self.api.get(routes::ME).await?;
        Ok(reply.user)
    }

    async fn validate_session(&self) -> GatewayResult<SessionValidity> {
        self.api.get(routes::VALIDATE_SESSION).await
    }

    async fn update_fcm_token(&self, token: &str) -> GatewayResult<()> {
        let request = FcmTokenRequest {
            fcm_token: token.to_string(),
        };
        self.api.put(routes::FCM_TOKEN, &request).await
    }

    async fn attach_token(&self, token: Option<&AccessToken>) {
        debug!(
            "[HttpAuthGateway] {} bearer token",
            if token.is_some() { "Attaching" } else { "Clearing" }
        );
        self.api.set_token(token.cloned()).await;
    }
}
