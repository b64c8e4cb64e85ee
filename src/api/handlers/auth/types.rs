//! Request/response types and the structured rejection payload.

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::otp::OtpPurpose;
use crate::session::AuthError;

/// Machine-readable rejection reasons. Authentication failures share one
/// class and never reveal which fact failed; the KYC and rate-limit reasons
/// are deliberately distinguishable so clients can remediate or back off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    InvalidCredentials,
    RateLimited,
    OtpExpired,
    OtpLocked,
    RefreshTokenInactive,
    KycNotApproved,
    Transient,
}

/// Structured rejection body: `{ "reason_code": ..., "message": ... }`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Rejection {
    pub reason_code: ReasonCode,
    pub message: String,
}

impl Rejection {
    #[must_use]
    pub fn new(reason_code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            reason_code,
            message: message.into(),
        }
    }
}

/// Map a service error to the wire response. The messages stay generic for
/// the authentication class (anti-enumeration).
#[must_use]
pub fn auth_error_response(err: &AuthError) -> (StatusCode, Json<Rejection>) {
    let (status, rejection) = match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            Rejection::new(ReasonCode::InvalidCredentials, "Authentication failed"),
        ),
        AuthError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Rejection::new(ReasonCode::RateLimited, "Too many requests, slow down"),
        ),
        AuthError::OtpExpired => (
            StatusCode::UNAUTHORIZED,
            Rejection::new(ReasonCode::OtpExpired, "Code expired, request a new one"),
        ),
        AuthError::OtpLocked => (
            StatusCode::UNAUTHORIZED,
            Rejection::new(
                ReasonCode::OtpLocked,
                "Too many attempts, request a new code",
            ),
        ),
        AuthError::RefreshTokenInactive => (
            StatusCode::UNAUTHORIZED,
            Rejection::new(
                ReasonCode::RefreshTokenInactive,
                "Session expired, sign in again",
            ),
        ),
        AuthError::Transient(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Rejection::new(ReasonCode::Transient, "Temporary failure, retry later"),
        ),
    };
    (status, Json(rejection))
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpLoginRequest {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpSendRequest {
    pub email: String,
    pub purpose: OtpPurpose,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpSendResponse {
    pub dispatched: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub code: String,
    pub purpose: OtpPurpose,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpVerifyResponse {
    pub exchange_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub exchange_token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub kyc_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn reason_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ReasonCode::KycNotApproved).expect("serialize");
        assert_eq!(json, "\"KYC_NOT_APPROVED\"");
        let json = serde_json::to_string(&ReasonCode::RefreshTokenInactive).expect("serialize");
        assert_eq!(json, "\"REFRESH_TOKEN_INACTIVE\"");
    }

    #[test]
    fn auth_errors_map_to_expected_statuses() {
        let (status, body) = auth_error_response(&AuthError::InvalidCredentials);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.reason_code, ReasonCode::InvalidCredentials);

        let (status, body) = auth_error_response(&AuthError::RateLimited);
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.reason_code, ReasonCode::RateLimited);

        let (status, body) = auth_error_response(&AuthError::RefreshTokenInactive);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.reason_code, ReasonCode::RefreshTokenInactive);

        let (status, body) = auth_error_response(&AuthError::Transient(anyhow!("db down")));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.reason_code, ReasonCode::Transient);
    }

    #[test]
    fn invalid_credentials_message_does_not_leak_cause() {
        let (_, body) = auth_error_response(&AuthError::InvalidCredentials);
        let message = body.message.to_lowercase();
        assert!(!message.contains("password"));
        assert!(!message.contains("user"));
        assert!(!message.contains("account"));
    }

    #[test]
    fn send_request_round_trips_with_purpose() {
        let request = OtpSendRequest {
            email: "dealer@example.com".to_string(),
            purpose: OtpPurpose::PasswordReset,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["purpose"], "password_reset");
        let decoded: OtpSendRequest = serde_json::from_value(value).expect("deserialize");
        assert_eq!(decoded.purpose, OtpPurpose::PasswordReset);
    }
}
