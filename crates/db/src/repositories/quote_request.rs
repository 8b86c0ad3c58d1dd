use sqlx::Row;

use lanehaul_core::domain::quote::{
    QuoteRequest, QuoteRequestId, QuoteRequestStatus, QuoteResponseId,
};
use lanehaul_core::domain::party::UserId;
use lanehaul_core::domain::shipment::ShipmentId;
use lanehaul_core::policy::ListScope;

use super::{parse_required_datetime, parse_stored, QuoteRequestRepository, RepositoryError};
use crate::DbPool;

pub(crate) const QUOTE_REQUEST_COLUMNS: &str = "id, created_by_user_id, from_location, \
     to_location, from_lat, from_lng, to_lat, to_lng, weight_kg, shipment_type, urgency, notes, \
     status, approved_response_id, shipment_id, created_at, updated_at";

pub struct SqlQuoteRequestRepository {
    pool: DbPool,
}

impl SqlQuoteRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_quote_request(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuoteRequest, RepositoryError> {
    let decode = |err: sqlx::Error| RepositoryError::Decode(err.to_string());

    let status_str: String = row.try_get("status").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    Ok(QuoteRequest {
        id: QuoteRequestId(row.try_get("id").map_err(decode)?),
        created_by_user_id: UserId(row.try_get("created_by_user_id").map_err(decode)?),
        from_location: row.try_get("from_location").map_err(decode)?,
        to_location: row.try_get("to_location").map_err(decode)?,
        from_lat: row.try_get("from_lat").map_err(decode)?,
        from_lng: row.try_get("from_lng").map_err(decode)?,
        to_lat: row.try_get("to_lat").map_err(decode)?,
        to_lng: row.try_get("to_lng").map_err(decode)?,
        weight_kg: row.try_get("weight_kg").map_err(decode)?,
        shipment_type: row.try_get("shipment_type").map_err(decode)?,
        urgency: row.try_get("urgency").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        status: parse_stored("quote_request.status", &status_str, QuoteRequestStatus::parse)?,
        approved_response_id: row
            .try_get::<Option<i64>, _>("approved_response_id")
            .map_err(decode)?
            .map(QuoteResponseId),
        shipment_id: row
            .try_get::<Option<i64>, _>("shipment_id")
            .map_err(decode)?
            .map(ShipmentId),
        created_at: parse_required_datetime("quote_request.created_at", created_at_str)?,
        updated_at: parse_required_datetime("quote_request.updated_at", updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl QuoteRequestRepository for SqlQuoteRequestRepository {
    async fn find_by_id(
        &self,
        id: QuoteRequestId,
    ) -> Result<Option<QuoteRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_REQUEST_COLUMNS} FROM quote_request WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote_request(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<QuoteRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = match scope {
            ListScope::All => {
                sqlx::query(&format!(
                    "SELECT {QUOTE_REQUEST_COLUMNS} FROM quote_request ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            ListScope::Company(company_id) => {
                sqlx::query(&format!(
                    "SELECT qr.{} FROM quote_request qr
                     JOIN app_user u ON u.id = qr.created_by_user_id
                     WHERE u.company_id = ?
                     ORDER BY qr.created_at DESC",
                    QUOTE_REQUEST_COLUMNS.replace(", ", ", qr.")
                ))
                .bind(company_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            ListScope::Own(user_id) => {
                sqlx::query(&format!(
                    "SELECT {QUOTE_REQUEST_COLUMNS} FROM quote_request
                     WHERE created_by_user_id = ? ORDER BY created_at DESC"
                ))
                .bind(user_id.0)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_quote_request).collect::<Result<Vec<_>, _>>()
    }
}
