use sqlx::Row;

use lanehaul_core::domain::consent_log::{ConsentActor, ConsentLogEntry};
use lanehaul_core::domain::party::UserId;
use lanehaul_core::domain::quote::QuoteResponseId;
use lanehaul_core::domain::response::ConsentStatus;
use lanehaul_core::domain::shipment::ShipmentId;

use super::{parse_required_datetime, parse_stored, ConsentLogRepository, RepositoryError};
use crate::DbPool;

pub(crate) const CONSENT_LOG_COLUMNS: &str = "id, quote_response_id, shipment_id, status_before, \
     status_after, actor_type, actor_id, note, created_at";

pub struct SqlConsentLogRepository {
    pool: DbPool,
}

impl SqlConsentLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_consent_log(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ConsentLogEntry, RepositoryError> {
    let decode = |err: sqlx::Error| RepositoryError::Decode(err.to_string());

    let status_before_str: String = row.try_get("status_before").map_err(decode)?;
    let status_after_str: String = row.try_get("status_after").map_err(decode)?;
    let actor_type_str: String = row.try_get("actor_type").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;

    Ok(ConsentLogEntry {
        id: row.try_get("id").map_err(decode)?,
        quote_response_id: QuoteResponseId(row.try_get("quote_response_id").map_err(decode)?),
        shipment_id: row
            .try_get::<Option<i64>, _>("shipment_id")
            .map_err(decode)?
            .map(ShipmentId),
        status_before: parse_stored(
            "consent_log.status_before",
            &status_before_str,
            ConsentStatus::parse,
        )?,
        status_after: parse_stored(
            "consent_log.status_after",
            &status_after_str,
            ConsentStatus::parse,
        )?,
        actor_type: parse_stored("consent_log.actor_type", &actor_type_str, ConsentActor::parse)?,
        actor_id: row.try_get::<Option<i64>, _>("actor_id").map_err(decode)?.map(UserId),
        note: row.try_get("note").map_err(decode)?,
        created_at: parse_required_datetime("consent_log.created_at", created_at_str)?,
    })
}

#[async_trait::async_trait]
impl ConsentLogRepository for SqlConsentLogRepository {
    async fn list_for_response(
        &self,
        response_id: QuoteResponseId,
    ) -> Result<Vec<ConsentLogEntry>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {CONSENT_LOG_COLUMNS} FROM consent_log
             WHERE quote_response_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(response_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_consent_log).collect::<Result<Vec<_>, _>>()
    }
}
