//! Authentication vocabulary shared between the client and the server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an OTP is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Login,
    Registration,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Login => "login",
            OtpPurpose::Registration => "registration",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable failure code attached to rejected auth requests.
///
/// Codes the client branches on get their own variant; anything else is
/// preserved verbatim in `Other` so callers still see what the server said.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthErrorCode {
    UserNotFound,
    InvalidOtp,
    OtpExpired,
    SessionTerminated,
    InvalidCredentials,
    UserAlreadyExists,
    RateLimited,
    Other(String),
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            AuthErrorCode::UserNotFound => "USER_NOT_FOUND",
            AuthErrorCode::InvalidOtp => "INVALID_OTP",
            AuthErrorCode::OtpExpired => "OTP_EXPIRED",
            AuthErrorCode::SessionTerminated => "SESSION_TERMINATED",
            AuthErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthErrorCode::UserAlreadyExists => "USER_ALREADY_EXISTS",
            AuthErrorCode::RateLimited => "RATE_LIMITED",
            AuthErrorCode::Other(code) => code,
        }
    }
}

impl From<&str> for AuthErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "USER_NOT_FOUND" => AuthErrorCode::UserNotFound,
            "INVALID_OTP" => AuthErrorCode::InvalidOtp,
            "OTP_EXPIRED" => AuthErrorCode::OtpExpired,
            "SESSION_TERMINATED" => AuthErrorCode::SessionTerminated,
            "INVALID_CREDENTIALS" => AuthErrorCode::InvalidCredentials,
            "USER_ALREADY_EXISTS" => AuthErrorCode::UserAlreadyExists,
            "RATE_LIMITED" => AuthErrorCode::RateLimited,
            other => AuthErrorCode::Other(other.to_string()),
        }
    }
}

impl From<String> for AuthErrorCode {
    fn from(code: String) -> Self {
        match AuthErrorCode::from(code.as_str()) {
            AuthErrorCode::Other(_) => AuthErrorCode::Other(code),
            known => known,
        }
    }
}

impl From<AuthErrorCode> for String {
    fn from(code: AuthErrorCode) -> Self {
        match code {
            AuthErrorCode::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_parse_and_unknown_codes_survive() {
        let expired: AuthErrorCode =
            serde_json::from_str("\"OTP_EXPIRED\"").unwrap();
        assert_eq!(expired, AuthErrorCode::OtpExpired);

        let custom: AuthErrorCode =
            serde_json::from_str("\"ACCOUNT_FROZEN\"").unwrap();
        assert_eq!(custom, AuthErrorCode::Other("ACCOUNT_FROZEN".into()));
        assert_eq!(
            serde_json::to_string(&custom).unwrap(),
            "\"ACCOUNT_FROZEN\""
        );
    }

    #[test]
    fn purpose_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&OtpPurpose::Registration).unwrap(),
            "\"registration\""
        );
    }
}
