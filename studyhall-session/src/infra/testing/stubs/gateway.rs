use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use studyhall_model::{
    LoginGrant, OtpDispatch, OtpPurpose, OtpVerification, RegistrationProfile,
    SessionValidity, User,
};
use tokio::sync::Notify;

use crate::domains::session::errors::{GatewayError, GatewayResult};
use crate::domains::session::security::AccessToken;
use crate::infra::services::gateway::AuthGateway;

/// A login reply for `user` carrying `token`.
pub fn grant(token: &str, user: User) -> LoginGrant {
    LoginGrant {
        token: token.to_string(),
        user,
        previous_session_terminated: false,
    }
}

/// A call observed by [`StubAuthGateway`]. Secrets are not recorded except
/// for OTP codes, which tests assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    SendOtp { phone: String, purpose: OtpPurpose },
    VerifyOtp { phone: String, code: String },
    LoginWithOtp {
        phone: String,
        code: String,
        push_token: Option<String>,
    },
    LoginWithPassword {
        identifier: String,
        push_token: Option<String>,
    },
    Register {
        phone: String,
        push_token: Option<String>,
    },
    Logout,
    GetCurrentUser,
    ValidateSession,
    UpdateFcmToken(String),
}

/// Scripted in-memory [`AuthGateway`].
///
/// Each operation returns whatever was last scripted for it. Logins and the
/// current-user fetch fail with a transport error until scripted.
#[derive(Debug, Clone)]
pub struct StubAuthGateway {
    inner: Arc<Mutex<InnerGatewayState>>,
}

#[derive(Debug)]
struct InnerGatewayState {
    send_otp: GatewayResult<OtpDispatch>,
    verify_otp: GatewayResult<OtpVerification>,
    login_with_otp: GatewayResult<LoginGrant>,
    login_with_password: GatewayResult<LoginGrant>,
    register: GatewayResult<LoginGrant>,
    logout: GatewayResult<()>,
    current_user: GatewayResult<User>,
    validate_session: GatewayResult<SessionValidity>,
    update_fcm_token: GatewayResult<()>,
    calls: Vec<GatewayCall>,
    attached_token: Option<String>,
    current_user_gate: Option<Arc<Notify>>,
    logout_delay: Option<Duration>,
}

fn not_scripted() -> GatewayError {
    GatewayError::transport("stub: not scripted")
}

impl Default for StubAuthGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl StubAuthGateway {
    pub fn new() -> Self {
        let inner = InnerGatewayState {
            send_otp: Ok(OtpDispatch {
                success: true,
                otp: None,
            }),
            verify_otp: Ok(OtpVerification {
                success: true,
                verified: true,
            }),
            login_with_otp: Err(not_scripted()),
            login_with_password: Err(not_scripted()),
            register: Err(not_scripted()),
            logout: Ok(()),
            current_user: Err(not_scripted()),
            validate_session: Ok(SessionValidity { valid: true }),
            update_fcm_token: Ok(()),
            calls: Vec::new(),
            attached_token: None,
            current_user_gate: None,
            logout_delay: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn set_send_otp(&self, result: GatewayResult<OtpDispatch>) {
        self.inner.lock().send_otp = result;
    }

    pub fn set_verify_otp(&self, result: GatewayResult<OtpVerification>) {
        self.inner.lock().verify_otp = result;
    }

    pub fn set_login_with_otp(&self, result: GatewayResult<LoginGrant>) {
        self.inner.lock().login_with_otp = result;
    }

    pub fn set_login_with_password(&self, result: GatewayResult<LoginGrant>) {
        self.inner.lock().login_with_password = result;
    }

    pub fn set_register(&self, result: GatewayResult<LoginGrant>) {
        self.inner.lock().register = result;
    }

    pub fn set_logout(&self, result: GatewayResult<()>) {
        self.inner.lock().logout = result;
    }

    pub fn set_current_user(&self, result: GatewayResult<User>) {
        self.inner.lock().current_user = result;
    }

    pub fn set_validate_session(&self, result: GatewayResult<SessionValidity>) {
        self.inner.lock().validate_session = result;
    }

    pub fn set_update_fcm_token(&self, result: GatewayResult<()>) {
        self.inner.lock().update_fcm_token = result;
    }

    /// Make `logout` take `delay` before answering.
    pub fn set_logout_delay(&self, delay: Duration) {
        self.inner.lock().logout_delay = Some(delay);
    }

    /// Park every `get_current_user` call until the returned handle is
    /// notified. The scripted result is read after release.
    pub fn hold_current_user(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().current_user_gate = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, matches: impl Fn(&GatewayCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|call| matches(call)).count()
    }

    /// Bearer token most recently attached by the session manager.
    pub fn attached_token(&self) -> Option<String> {
        self.inner.lock().attached_token.clone()
    }

    fn record(&self, call: GatewayCall) {
        self.inner.lock().calls.push(call);
    }
}

#[async_trait]
impl AuthGateway for StubAuthGateway {
    async fn send_otp(
        &self,
        phone: &str,
        purpose: OtpPurpose,
    ) -> GatewayResult<OtpDispatch> {
        self.record(GatewayCall::SendOtp {
            phone: phone.to_string(),
            purpose,
        });
        self.inner.lock().send_otp.clone()
    }

    async fn verify_otp(
        &self,
        phone: &str,
        code: &str,
    ) -> GatewayResult<OtpVerification> {
        self.record(GatewayCall::VerifyOtp {
            phone: phone.to_string(),
            code: code.to_string(),
        });
        self.inner.lock().verify_otp.clone()
    }

    async fn login_with_otp(
        &self,
        phone: &str,
        code: &str,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant> {
        self.record(GatewayCall::LoginWithOtp {
            phone: phone.to_string(),
            code: code.to_string(),
            push_token: push_token.map(str::to_string),
        });
        self.inner.lock().login_with_otp.clone()
    }

    async fn login_with_password(
        &self,
        identifier: &str,
        _secret: &str,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant> {
        self.record(GatewayCall::LoginWithPassword {
            identifier: identifier.to_string(),
            push_token: push_token.map(str::to_string),
        });
        self.inner.lock().login_with_password.clone()
    }

    async fn register(
        &self,
        profile: &RegistrationProfile,
        push_token: Option<&str>,
    ) -> GatewayResult<LoginGrant> {
        self.record(GatewayCall::Register {
            phone: profile.phone.clone(),
            push_token: push_token.map(str::to_string),
        });
        self.inner.lock().register.clone()
    }

    async fn logout(&self) -> GatewayResult<()> {
        self.record(GatewayCall::Logout);
        let delay = self.inner.lock().logout_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.lock().logout.clone()
    }

    async fn get_current_user(&self) -> GatewayResult<User> {
        self.record(GatewayCall::GetCurrentUser);
        let gate = self.inner.lock().current_user_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.lock().current_user.clone()
    }

    async fn validate_session(&self) -> GatewayResult<SessionValidity> {
        self.record(GatewayCall::ValidateSession);
        self.inner.lock().validate_session.clone()
    }

    async fn update_fcm_token(&self, token: &str) -> GatewayResult<()> {
        self.record(GatewayCall::UpdateFcmToken(token.to_string()));
        self.inner.lock().update_fcm_token.clone()
    }

    async fn attach_token(&self, token: Option<&AccessToken>) {
        self.inner.lock().attached_token =
            token.map(|token| token.expose_secret().to_string());
    }
}
