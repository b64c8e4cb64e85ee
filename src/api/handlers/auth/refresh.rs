//! Refresh-token rotation and logout endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

use super::state::AuthState;
use super::types::{LogoutRequest, RefreshRequest, auth_error_response};
use super::utils::{extract_client_meta, telemetry_subject};
use crate::session::TokenPair;

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated", body = TokenPair),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Token inactive", body = super::types::Rejection)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let request: RefreshRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    if request.refresh_token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    }

    let client = extract_client_meta(&headers);
    match auth_state
        .sessions()
        .refresh(&request.refresh_token, &client)
        .await
    {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(err) => {
            // Subject comes from the unverified bearer, if any; it labels the
            // trace and nothing else.
            debug!(subject = ?telemetry_subject(&headers), "refresh rejected: {err}");
            auth_error_response(&err).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Token revoked (or already inactive)"),
        (status = 400, description = "Malformed request", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    let request: LogoutRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let client = extract_client_meta(&headers);
    // Logout never reveals whether the token existed; a store failure is
    // logged and still reported as success so clients can drop local state.
    if let Err(err) = auth_state
        .sessions()
        .logout(&request.refresh_token, &client)
        .await
    {
        debug!("logout revocation failed: {err}");
    }
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::auth_state;
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn refresh_missing_payload() -> Result<()> {
        let response = refresh(HeaderMap::new(), Extension(auth_state()?), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_empty_token() -> Result<()> {
        let response = refresh(
            HeaderMap::new(),
            Extension(auth_state()?),
            Some(Json(RefreshRequest {
                refresh_token: String::new(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn logout_missing_payload() -> Result<()> {
        let response = logout(HeaderMap::new(), Extension(auth_state()?), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
