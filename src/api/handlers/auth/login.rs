//! Login endpoints: password and OTP paths.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

use super::state::AuthState;
use super::types::{OtpLoginRequest, PasswordLoginRequest, auth_error_response};
use super::utils::{extract_client_meta, normalize_email, valid_email};
use crate::session::TokenPair;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = PasswordLoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenPair),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Authentication failed", body = super::types::Rejection),
        (status = 503, description = "Temporary failure", body = super::types::Rejection)
    ),
    tag = "auth"
)]
pub async fn login_password(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordLoginRequest>>,
) -> impl IntoResponse {
    let request: PasswordLoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) || request.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    }

    let client = extract_client_meta(&headers);
    match auth_state
        .sessions()
        .login_with_password(&email, &request.password, &client)
        .await
    {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(err) => {
            debug!("password login rejected: {err}");
            auth_error_response(&err).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login/otp",
    request_body = OtpLoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenPair),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Authentication failed", body = super::types::Rejection),
        (status = 429, description = "Rate limited", body = super::types::Rejection)
    ),
    tag = "auth"
)]
pub async fn login_otp(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpLoginRequest>>,
) -> impl IntoResponse {
    let request: OtpLoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    let code = request.code.trim();
    if !valid_email(&email) || code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    }

    let client = extract_client_meta(&headers);
    match auth_state
        .sessions()
        .login_with_otp(&email, code, &client)
        .await
    {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(err) => {
            debug!("otp login rejected: {err}");
            auth_error_response(&err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::auth_state;
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn login_password_missing_payload() -> Result<()> {
        let response = login_password(HeaderMap::new(), Extension(auth_state()?), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_password_rejects_malformed_email() -> Result<()> {
        let response = login_password(
            HeaderMap::new(),
            Extension(auth_state()?),
            Some(Json(PasswordLoginRequest {
                email: "not-an-email".to_string(),
                password: "hunter2".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_otp_rejects_non_numeric_code() -> Result<()> {
        let response = login_otp(
            HeaderMap::new(),
            Extension(auth_state()?),
            Some(Json(OtpLoginRequest {
                email: "dealer@example.com".to_string(),
                code: "abc123".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
