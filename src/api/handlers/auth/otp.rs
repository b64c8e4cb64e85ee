//! OTP send and verify endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

use super::state::AuthState;
use super::types::{
    OtpSendRequest, OtpSendResponse, OtpVerifyRequest, OtpVerifyResponse, ReasonCode, Rejection,
};
use super::utils::{extract_client_meta, normalize_email, valid_email};
use crate::otp::OtpError;

#[utoipa::path(
    post,
    path = "/v1/auth/otp/send",
    request_body = OtpSendRequest,
    responses(
        (status = 200, description = "Request accepted", body = OtpSendResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 429, description = "Rate limited", body = Rejection)
    ),
    tag = "auth"
)]
pub async fn otp_send(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpSendRequest>>,
) -> impl IntoResponse {
    let request: OtpSendRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    }

    let client = extract_client_meta(&headers);
    match auth_state
        .sessions()
        .otp()
        .send(&email, request.purpose, &client)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(OtpSendResponse {
                dispatched: outcome.delivered,
            }),
        )
            .into_response(),
        Err(OtpError::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(Rejection::new(
                ReasonCode::RateLimited,
                "Too many codes requested, try again later",
            )),
        )
            .into_response(),
        Err(err) => {
            // Store failures stay opaque; a probe learns nothing about the
            // identifier from this path.
            debug!("otp send failed: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Rejection::new(
                    ReasonCode::Transient,
                    "Temporary failure, try again",
                )),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Code accepted", body = OtpVerifyResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Code rejected", body = Rejection),
        (status = 429, description = "Rate limited", body = Rejection)
    ),
    tag = "auth"
)]
pub async fn otp_verify(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> impl IntoResponse {
    let request: OtpVerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    let code = request.code.trim();
    if !valid_email(&email) || code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    }

    match auth_state
        .sessions()
        .otp()
        .verify(&email, code, request.purpose)
        .await
    {
        Ok(verification) => (
            StatusCode::OK,
            Json(OtpVerifyResponse {
                exchange_token: verification.exchange_token,
            }),
        )
            .into_response(),
        Err(err) => {
            debug!("otp verify rejected: {err}");
            otp_rejection(&err).into_response()
        }
    }
}

fn otp_rejection(err: &OtpError) -> (StatusCode, Json<Rejection>) {
    match err {
        OtpError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(Rejection::new(
                ReasonCode::RateLimited,
                "Too many codes requested, try again later",
            )),
        ),
        OtpError::Expired => (
            StatusCode::UNAUTHORIZED,
            Json(Rejection::new(
                ReasonCode::OtpExpired,
                "Code expired, request a new one",
            )),
        ),
        OtpError::Locked => (
            StatusCode::UNAUTHORIZED,
            Json(Rejection::new(
                ReasonCode::OtpLocked,
                "Too many attempts, request a new code",
            )),
        ),
        OtpError::Invalid => (
            StatusCode::UNAUTHORIZED,
            Json(Rejection::new(
                ReasonCode::InvalidCredentials,
                "Invalid code",
            )),
        ),
        OtpError::Store(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Rejection::new(
                ReasonCode::Transient,
                "Temporary failure, try again",
            )),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::auth_state;
    use super::*;
    use crate::otp::OtpPurpose;
    use anyhow::Result;

    #[tokio::test]
    async fn otp_send_missing_payload() -> Result<()> {
        let response = otp_send(HeaderMap::new(), Extension(auth_state()?), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn otp_verify_rejects_malformed_email() -> Result<()> {
        let response = otp_verify(
            Extension(auth_state()?),
            Some(Json(OtpVerifyRequest {
                email: "nope".to_string(),
                code: "123456".to_string(),
                purpose: OtpPurpose::Login,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[test]
    fn expired_maps_to_unauthorized_with_reason() {
        let (status, Json(rejection)) = otp_rejection(&OtpError::Expired);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.reason_code, ReasonCode::OtpExpired);
    }

    #[test]
    fn locked_maps_to_unauthorized_with_reason() {
        let (status, Json(rejection)) = otp_rejection(&OtpError::Locked);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.reason_code, ReasonCode::OtpLocked);
    }
}
