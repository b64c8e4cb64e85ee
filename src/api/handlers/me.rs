//! Authenticated self-service endpoint behind the compliance gate.

use axum::{
    Json,
    extract::{Extension, Request},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use tracing::error;

use super::auth::types::MeResponse;
use super::auth::utils::claims_from_extensions;
use crate::kyc;
use crate::session::Role;

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Authenticated principal", body = MeResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Dealer compliance not approved", body = super::auth::types::Rejection)
    ),
    tag = "me"
)]
/// Return the authenticated principal as seen by the access token, plus
/// the current compliance status for dealers. The gate middleware has
/// already validated the token and placed the claims into extensions.
pub async fn get_me(pool: Extension<PgPool>, request: Request) -> impl IntoResponse {
    let Some(claims) = claims_from_extensions(request.extensions()).cloned() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let kyc_status = if claims.role == Role::Dealer {
        match kyc::latest_status(&pool, claims.sub).await {
            Ok(status) => status.map(|status| status.as_str().to_string()),
            Err(err) => {
                error!("Failed to lookup kyc status for /v1/me: {err}");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        }
    } else {
        None
    };

    let response = MeResponse {
        user_id: claims.sub.to_string(),
        email: claims.email,
        role: claims.role.as_str().to_string(),
        kyc_status,
    };
    (StatusCode::OK, Json(response)).into_response()
}
