//! Password reset endpoint, driven by an OTP exchange token.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

use super::state::AuthState;
use super::types::{ResetPasswordRequest, auth_error_response};

const MIN_PASSWORD_LEN: usize = 8;

#[utoipa::path(
    post,
    path = "/v1/auth/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced, all sessions revoked"),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Exchange token rejected", body = super::types::Rejection)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    if request.exchange_token.is_empty() || request.new_password.len() < MIN_PASSWORD_LEN {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    }

    match auth_state
        .sessions()
        .reset_password_via_exchange(&request.exchange_token, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            debug!("password reset rejected: {err}");
            auth_error_response(&err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::auth_state;
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn reset_missing_payload() -> Result<()> {
        let response = reset_password(Extension(auth_state()?), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_rejects_short_password() -> Result<()> {
        let response = reset_password(
            Extension(auth_state()?),
            Some(Json(ResetPasswordRequest {
                exchange_token: "token".to_string(),
                new_password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
