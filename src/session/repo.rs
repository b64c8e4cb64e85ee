//! Database access for principals and refresh tokens.
//!
//! Refresh secrets are hashed before every query; the raw value never
//! touches the database. Rotation claims the old row with a single
//! conditional UPDATE so concurrent rotations have exactly one winner.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::models::{Principal, Role};

pub(super) fn hash_refresh_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn principal_from_row(row: &sqlx::postgres::PgRow) -> Option<Principal> {
    let role: String = row.get("role");
    Some(Principal {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::parse(&role)?,
        active: row.get("active"),
    })
}

/// Look up a principal by normalized email. Rows with unknown roles are
/// treated as absent rather than crashing the login path.
pub(super) async fn find_principal_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Principal>> {
    let query = r"
        SELECT id, email, password_hash, role, active
        FROM users
        WHERE email = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup principal by email")?;
    Ok(row.as_ref().and_then(principal_from_row))
}

pub(super) async fn find_principal_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Principal>> {
    let query = r"
        SELECT id, email, password_hash, role, active
        FROM users
        WHERE id = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup principal by id")?;
    Ok(row.as_ref().and_then(principal_from_row))
}

pub(super) async fn update_password_hash(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    new_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(new_hash)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(())
}

/// Persist a new refresh token and return its row id.
pub(super) async fn insert_refresh_token<'e, E>(
    executor: E,
    user_id: Uuid,
    secret_hash: &[u8],
    ttl_seconds: i64,
    source_ip: Option<&str>,
) -> Result<Uuid>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let query = r"
        INSERT INTO refresh_tokens
            (user_id, secret_hash, expires_at, created_from)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'), $4::inet)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(secret_hash)
        .bind(ttl_seconds)
        .bind(source_ip)
        .fetch_one(executor)
        .instrument(span)
        .await
        .context("failed to insert refresh token")?;
    Ok(row.get("id"))
}

/// Claim an active token for rotation: revoke it and return its identity.
///
/// The conditional UPDATE is the concurrency guard; of two simultaneous
/// rotations one gets the row, the other gets `None` and must be treated as
/// reuse.
pub(super) async fn claim_for_rotation(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    secret_hash: &[u8],
    source_ip: Option<&str>,
) -> Result<Option<(Uuid, Uuid)>> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE, revoked_at = NOW(), revoked_from = $2::inet
        WHERE secret_hash = $1
          AND revoked = FALSE
          AND expires_at > NOW()
        RETURNING id, user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(secret_hash)
        .bind(source_ip)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to claim refresh token for rotation")?;
    Ok(row.map(|row| (row.get("id"), row.get("user_id"))))
}

/// Record the rotation chain: old row points at its replacement.
pub(super) async fn link_replacement(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    old_id: Uuid,
    new_id: Uuid,
) -> Result<()> {
    let query = r"
        UPDATE refresh_tokens
        SET replaced_by = $2
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(old_id)
        .bind(new_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to link replacement refresh token")?;
    Ok(())
}

/// Revoke a token by secret. Idempotent: revoking an unknown or
/// already-revoked token is a no-op success.
pub(super) async fn revoke(
    pool: &PgPool,
    secret_hash: &[u8],
    source_ip: Option<&str>,
) -> Result<()> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE, revoked_at = NOW(), revoked_from = $2::inet
        WHERE secret_hash = $1
          AND revoked = FALSE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(secret_hash)
        .bind(source_ip)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;
    Ok(())
}

/// Revoke every token for a principal (password reset remediation).
pub(super) async fn revoke_all_for_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<u64> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE, revoked_at = NOW()
        WHERE user_id = $1
          AND revoked = FALSE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to revoke refresh tokens for user")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_secret_hash_is_stable_and_distinct() {
        let first = hash_refresh_secret("secret");
        let second = hash_refresh_secret("secret");
        let different = hash_refresh_secret("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }
}
