//! Axum wrapper around the gate decision.
//!
//! Applied to the protected business route prefixes. The middleware only
//! resolves claims and compliance state, then defers to [`super::decide`].

use axum::{
    Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{GateDecision, decide, repo};
use crate::api::handlers::auth::types::{ReasonCode, Rejection};
use crate::api::handlers::auth::utils::extract_bearer_token;
use crate::session::Role;
use crate::token::TokenIssuer;

/// Reject dealers without an approved compliance record.
///
/// Unauthenticated or invalid-token requests pass through untouched:
/// admission is downstream authorization's job, and this gate must not turn
/// into a second authentication layer.
pub async fn require_dealer_kyc(mut request: Request, next: Next) -> Response {
    let Some(tokens) = request.extensions().get::<Arc<TokenIssuer>>().cloned() else {
        error!("kyc gate missing token issuer extension");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let Some(pool) = request.extensions().get::<PgPool>().cloned() else {
        error!("kyc gate missing database pool extension");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let claims = extract_bearer_token(request.headers()).and_then(|token| tokens.decode(&token));

    let kyc = match claims.as_ref() {
        Some(claims) if claims.role == Role::Dealer => {
            match repo::latest_status(&pool, claims.sub).await {
                Ok(status) => status,
                Err(err) => {
                    error!("Failed to lookup kyc status: {err}");
                    return (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(Rejection::new(
                            ReasonCode::Transient,
                            "Compliance lookup failed, retry later",
                        )),
                    )
                        .into_response();
                }
            }
        }
        _ => None,
    };

    match decide(claims.as_ref(), kyc) {
        GateDecision::Allow => {
            // Hand validated claims to downstream handlers.
            if let Some(claims) = claims {
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
        GateDecision::Reject { status } => {
            let message = match status {
                Some(status) => format!(
                    "Dealer verification is {}; complete KYC to access this resource",
                    status.as_str()
                ),
                None => "Dealer verification has not been submitted".to_string(),
            };
            (
                StatusCode::FORBIDDEN,
                Json(Rejection::new(ReasonCode::KycNotApproved, message)),
            )
                .into_response()
        }
    }
}
