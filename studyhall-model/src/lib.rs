//! Core data model definitions shared across StudyHall crates.
#![allow(missing_docs)]

pub mod auth;
pub mod contracts;
pub mod ids;
pub mod user;

pub use auth::{AuthErrorCode, OtpPurpose};
pub use contracts::{
    ApiReply, CurrentUser, FcmTokenRequest, LoginGrant, OtpDispatch,
    OtpLoginRequest, OtpVerification, PasswordLoginRequest, RegisterRequest,
    RegistrationProfile, SendOtpRequest, SessionValidity, VerifyOtpRequest,
};
pub use ids::UserId;
pub use user::{User, UserPatch};
