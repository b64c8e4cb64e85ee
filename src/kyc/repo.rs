//! Read-only access to dealer compliance records.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::KycStatus;

/// Latest compliance record for a dealer, if any. Unknown status values are
/// treated as absent rather than failing the request.
pub async fn latest_status(pool: &PgPool, dealer_id: Uuid) -> Result<Option<KycStatus>> {
    let query = r"
        SELECT status
        FROM dealer_kyc
        WHERE dealer_id = $1
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
        .bind(dealer_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup dealer kyc status")?;

    Ok(row.and_then(|row| {
        let status: String = row.get("status");
        KycStatus::parse(&status)
    }))
}
