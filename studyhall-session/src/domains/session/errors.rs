//! Session error types
//!
//! Failures are split by where they come from: the auth API (`GatewayError`),
//! the secure store (`StorageError`) and optional platform capabilities
//! (`PlatformError`). `SessionError` wraps the ones a caller can observe.

use std::fmt;

use studyhall_model::AuthErrorCode;
use thiserror::Error;

/// Broad classification of a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// The request never produced a usable HTTP response.
    Transport,
    /// The server answered and refused the request.
    Rejected,
    /// The server answered with something we could not decode.
    InvalidResponse,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayErrorKind::Transport => f.write_str("transport error"),
            GatewayErrorKind::Rejected => f.write_str("request rejected"),
            GatewayErrorKind::InvalidResponse => {
                f.write_str("invalid response")
            }
        }
    }
}

/// Error returned by an [`AuthGateway`](crate::AuthGateway) call.
///
/// The machine code is carried verbatim so OTP callers can branch on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}{}", code_suffix(.code))]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub code: Option<AuthErrorCode>,
    pub message: String,
}

fn code_suffix(code: &Option<AuthErrorCode>) -> String {
    match code {
        Some(code) => format!(" [{code}]"),
        None => String::new(),
    }
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Transport,
            code: None,
            message: message.into(),
        }
    }

    pub fn rejected(
        code: Option<AuthErrorCode>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: GatewayErrorKind::Rejected,
            code,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::InvalidResponse,
            code: None,
            message: message.into(),
        }
    }

    /// Rejection signalling that a newer login elsewhere replaced this session.
    pub fn session_terminated() -> Self {
        Self::rejected(
            Some(AuthErrorCode::SessionTerminated),
            "Session terminated: signed in on another device",
        )
    }

    pub fn code(&self) -> Option<&AuthErrorCode> {
        self.code.as_ref()
    }

    pub fn is_session_terminated(&self) -> bool {
        matches!(self.code, Some(AuthErrorCode::SessionTerminated))
    }

    /// Text suitable for an alert shown to the user.
    pub fn user_message(&self) -> String {
        if self.kind == GatewayErrorKind::Rejected
            && !self.message.trim().is_empty()
        {
            return self.message.clone();
        }

        match (&self.kind, &self.code) {
            (_, Some(AuthErrorCode::InvalidCredentials)) => {
                "Incorrect phone/email or password.".to_string()
            }
            (_, Some(AuthErrorCode::UserNotFound)) => {
                "No account found for these details.".to_string()
            }
            (_, Some(AuthErrorCode::UserAlreadyExists)) => {
                "An account with these details already exists.".to_string()
            }
            (_, Some(AuthErrorCode::RateLimited)) => {
                "Too many attempts. Please wait and try again.".to_string()
            }
            (GatewayErrorKind::Transport, _) => {
                "Unable to reach the server. Check your connection and try again."
                    .to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Result type for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Secure store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to initialize storage: {0}")]
    InitFailed(String),

    #[error("Failed to read from storage")]
    ReadFailed(#[source] std::io::Error),

    #[error("Failed to write to storage")]
    WriteFailed(#[source] std::io::Error),

    #[error("Encryption failed")]
    EncryptionFailed(#[source] anyhow::Error),

    #[error("Corrupted storage data: {0}")]
    CorruptedData(String),
}

/// Result type for secure store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Optional platform capability failures (push, encryption).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Capability not supported on this platform")]
    Unsupported,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Platform call failed: {0}")]
    Failed(String),
}

/// Errors surfaced to callers of the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Machine code of the underlying gateway rejection, if any.
    pub fn code(&self) -> Option<&AuthErrorCode> {
        match self {
            SessionError::Gateway(err) => err.code(),
            _ => None,
        }
    }
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::CorruptedData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = GatewayError::rejected(
            Some(AuthErrorCode::OtpExpired),
            "OTP has expired",
        );
        assert_eq!(
            err.to_string(),
            "request rejected: OTP has expired [OTP_EXPIRED]"
        );
    }

    #[test]
    fn session_error_exposes_gateway_code() {
        let err: SessionError = GatewayError::session_terminated().into();
        assert_eq!(err.code(), Some(&AuthErrorCode::SessionTerminated));
    }

    #[test]
    fn transport_errors_get_a_generic_message() {
        let err = GatewayError::transport("connection refused");
        assert!(err.user_message().starts_with("Unable to reach the server"));
    }
}
