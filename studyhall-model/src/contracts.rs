//! Request and response bodies exchanged with the auth API.
//!
//! Every reply is a flat JSON object carrying `success` plus, on failure,
//! an optional machine `code` and a human `message`. The remaining fields
//! are operation specific and decoded into the reply structs below.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::{AuthErrorCode, OtpPurpose};
use crate::user::User;

/// Status header present on every auth API reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<AuthErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub phone: String,
    pub purpose: OtpPurpose,
}

/// Reply to an OTP request.
///
/// `otp` is only echoed back by non-production backends for manual testing.
/// Nothing may depend on it being present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtpDispatch {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpVerification {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub verified: bool,
}

impl OtpVerification {
    pub fn is_verified(&self) -> bool {
        self.success && self.verified
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpLoginRequest {
    pub phone: String,
    pub otp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordLoginRequest {
    /// Phone number or email address.
    pub identifier: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
}

/// Sign-up form data. Extra form fields are forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationProfile {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistrationProfile {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    #[serde(flatten)]
    pub profile: &'a RegistrationProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<&'a str>,
}

/// Successful login, registration or OTP login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
    pub token: String,
    pub user: User,
    /// Set when this login evicted a session on another device.
    #[serde(default)]
    pub previous_session_terminated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionValidity {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmTokenRequest {
    pub fcm_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_grant_defaults_previous_session_flag() {
        let grant: LoginGrant = serde_json::from_value(json!({
            "success": true,
            "token": "abc",
            "user": { "id": "u-1" }
        }))
        .unwrap();
        assert!(!grant.previous_session_terminated);
        assert_eq!(grant.user.id.as_str(), "u-1");
    }

    #[test]
    fn register_request_flattens_profile() {
        let mut profile = RegistrationProfile::new("Asha", "9999999999");
        profile.extra.insert("grade".into(), json!(8));

        let body = serde_json::to_value(RegisterRequest {
            profile: &profile,
            fcm_token: Some("push-1"),
        })
        .unwrap();

        assert_eq!(body["name"], "Asha");
        assert_eq!(body["grade"], 8);
        assert_eq!(body["fcmToken"], "push-1");
    }

    #[test]
    fn reply_header_tolerates_missing_fields() {
        let reply: ApiReply =
            serde_json::from_value(json!({ "code": "INVALID_OTP" })).unwrap();
        assert!(!reply.success);
        assert_eq!(reply.code, Some(AuthErrorCode::InvalidOtp));
    }
}
