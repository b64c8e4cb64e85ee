//! Small helpers for input validation and request metadata.

use axum::http::{HeaderMap, header::AUTHORIZATION, header::USER_AGENT};
use regex::Regex;

use crate::otp::ClientMeta;
use crate::token::AccessClaims;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Extract a bearer token from the Authorization header.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extract a client IP from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Request-origin metadata recorded for audit on OTP and token rows.
pub(crate) fn extract_client_meta(headers: &HeaderMap) -> ClientMeta {
    ClientMeta {
        ip: extract_client_ip(headers),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

/// Log-safe subject hint for rejected requests; never used for
/// authorization.
pub(crate) fn telemetry_subject(headers: &HeaderMap) -> Option<uuid::Uuid> {
    extract_bearer_token(headers)
        .as_deref()
        .and_then(crate::token::TokenIssuer::extract_subject)
}

/// Validated claims placed into request extensions by the gate middleware.
pub(crate) fn claims_from_extensions(
    extensions: &axum::http::Extensions,
) -> Option<&AccessClaims> {
    extensions.get::<AccessClaims>()
}
