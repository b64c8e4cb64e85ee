//! Database access for OTP and exchange-token records.
//!
//! Rate windows are computed at query time from persisted rows rather than
//! from in-process counters, so the limits hold across service instances.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::models::{ClientMeta, OtpPurpose, OtpRecord};

pub(super) async fn count_recent_sends(
    pool: &PgPool,
    identifier: &str,
    purpose: OtpPurpose,
    window_seconds: i64,
) -> Result<i64> {
    let query = r"
        SELECT COUNT(*)
        FROM otp_codes
        WHERE identifier = $1
          AND purpose = $2
          AND created_at > NOW() - ($3 * INTERVAL '1 second')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identifier)
        .bind(purpose.as_str())
        .bind(window_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count recent otp sends")?;
    Ok(row.get(0))
}

pub(super) async fn count_recent_sends_from_ip(
    pool: &PgPool,
    ip: &str,
    window_seconds: i64,
) -> Result<i64> {
    let query = r"
        SELECT COUNT(*)
        FROM otp_codes
        WHERE client_ip = $1::inet
          AND created_at > NOW() - ($2 * INTERVAL '1 second')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(ip)
        .bind(window_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count recent otp sends by ip")?;
    Ok(row.get(0))
}

/// Mark prior outstanding codes superseded so only the newest one verifies.
pub(super) async fn supersede_outstanding(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    identifier: &str,
    purpose: OtpPurpose,
) -> Result<()> {
    let query = r"
        UPDATE otp_codes
        SET superseded = TRUE
        WHERE identifier = $1
          AND purpose = $2
          AND superseded = FALSE
          AND used = FALSE
          AND expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identifier)
        .bind(purpose.as_str())
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to supersede outstanding otp codes")?;
    Ok(())
}

pub(super) async fn insert_code(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    identifier: &str,
    purpose: OtpPurpose,
    code_hash: &[u8],
    ttl_seconds: i64,
    client: &ClientMeta,
) -> Result<Uuid> {
    let query = r"
        INSERT INTO otp_codes
            (identifier, purpose, code_hash, expires_at, client_ip, user_agent)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'), $5::inet, $6)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identifier)
        .bind(purpose.as_str())
        .bind(code_hash)
        .bind(ttl_seconds)
        .bind(client.ip.as_deref())
        .bind(client.user_agent.as_deref())
        .fetch_one(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert otp code")?;
    Ok(row.get("id"))
}

/// Latest non-superseded code for (identifier, purpose), regardless of
/// expiry or use; the service decides which rejection applies.
pub(super) async fn latest_outstanding(
    pool: &PgPool,
    identifier: &str,
    purpose: OtpPurpose,
) -> Result<Option<OtpRecord>> {
    let query = r"
        SELECT id, code_hash, expires_at, used, attempts
        FROM otp_codes
        WHERE identifier = $1
          AND purpose = $2
          AND superseded = FALSE
        ORDER BY created_at DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identifier)
        .bind(purpose.as_str())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup outstanding otp code")?;

    Ok(row.map(|row| OtpRecord {
        id: row.get("id"),
        code_hash: row.get("code_hash"),
        expires_at: row.get("expires_at"),
        used: row.get("used"),
        attempts: row.get("attempts"),
    }))
}

/// Increment the attempt counter and return the new count.
pub(super) async fn register_failed_attempt(pool: &PgPool, id: Uuid) -> Result<i32> {
    let query = r"
        UPDATE otp_codes
        SET attempts = attempts + 1
        WHERE id = $1
        RETURNING attempts
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to register otp attempt")?;
    Ok(row.get("attempts"))
}

/// Consume the code if it is still consumable. The WHERE clause makes this a
/// single-winner operation under concurrent verification.
pub(super) async fn consume(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE otp_codes
        SET used = TRUE, used_at = NOW()
        WHERE id = $1
          AND used = FALSE
          AND superseded = FALSE
          AND expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume otp code")?;
    Ok(row.is_some())
}

pub(super) async fn insert_exchange_token(
    pool: &PgPool,
    identifier: &str,
    purpose: OtpPurpose,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO otp_exchange_tokens
            (identifier, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identifier)
        .bind(purpose.as_str())
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert otp exchange token")?;
    Ok(())
}

/// Redeem an exchange token once, returning the identifier it was issued
/// for. Same consume-if-valid shape as the code consumption above.
pub(super) async fn redeem_exchange_token(
    pool: &PgPool,
    token_hash: &[u8],
    purpose: OtpPurpose,
) -> Result<Option<String>> {
    let query = r"
        UPDATE otp_exchange_tokens
        SET consumed_at = NOW()
        WHERE token_hash = $1
          AND purpose = $2
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING identifier
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to redeem otp exchange token")?;
    Ok(row.map(|row| row.get("identifier")))
}
