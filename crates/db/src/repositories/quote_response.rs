use sqlx::Row;

use lanehaul_core::domain::party::VendorId;
use lanehaul_core::domain::quote::{QuoteRequestId, QuoteResponseId};
use lanehaul_core::domain::response::{
    ConsentSource, ConsentStatus, QuoteResponse, QuoteResponseStatus,
};

use super::{
    parse_optional_datetime, parse_optional_decimal, parse_required_datetime, parse_stored,
    QuoteResponseRepository, RepositoryError,
};
use crate::DbPool;

pub(crate) const QUOTE_RESPONSE_COLUMNS: &str = "id, quote_request_id, vendor_id, status, \
     quoted_price, estimated_delivery, transporter_notes, consent_status, consent_at, \
     consent_source, expires_at, created_at, updated_at";

pub struct SqlQuoteResponseRepository {
    pool: DbPool,
}

impl SqlQuoteResponseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_quote_response(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuoteResponse, RepositoryError> {
    let decode = |err: sqlx::Error| RepositoryError::Decode(err.to_string());

    let status_str: String = row.try_get("status").map_err(decode)?;
    let consent_status_str: String = row.try_get("consent_status").map_err(decode)?;
    let consent_source_str: Option<String> = row.try_get("consent_source").map_err(decode)?;
    let quoted_price_str: Option<String> = row.try_get("quoted_price").map_err(decode)?;
    let estimated_delivery_str: Option<String> =
        row.try_get("estimated_delivery").map_err(decode)?;
    let consent_at_str: Option<String> = row.try_get("consent_at").map_err(decode)?;
    let expires_at_str: Option<String> = row.try_get("expires_at").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    let consent_source = consent_source_str
        .map(|raw| parse_stored("quote_response.consent_source", &raw, ConsentSource::parse))
        .transpose()?;

    Ok(QuoteResponse {
        id: QuoteResponseId(row.try_get("id").map_err(decode)?),
        quote_request_id: QuoteRequestId(row.try_get("quote_request_id").map_err(decode)?),
        vendor_id: VendorId(row.try_get("vendor_id").map_err(decode)?),
        status: parse_stored("quote_response.status", &status_str, QuoteResponseStatus::parse)?,
        quoted_price: parse_optional_decimal("quote_response.quoted_price", quoted_price_str)?,
        estimated_delivery: parse_optional_datetime(
            "quote_response.estimated_delivery",
            estimated_delivery_str,
        )?,
        transporter_notes: row.try_get("transporter_notes").map_err(decode)?,
        consent_status: parse_stored(
            "quote_response.consent_status",
            &consent_status_str,
            ConsentStatus::parse,
        )?,
        consent_at: parse_optional_datetime("quote_response.consent_at", consent_at_str)?,
        consent_source,
        expires_at: parse_optional_datetime("quote_response.expires_at", expires_at_str)?,
        created_at: parse_required_datetime("quote_response.created_at", created_at_str)?,
        updated_at: parse_required_datetime("quote_response.updated_at", updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl QuoteResponseRepository for SqlQuoteResponseRepository {
    async fn find_by_id(
        &self,
        id: QuoteResponseId,
    ) -> Result<Option<QuoteResponse>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote_response(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_request(
        &self,
        request_id: QuoteRequestId,
    ) -> Result<Vec<QuoteResponse>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response
             WHERE quote_request_id = ? ORDER BY created_at ASC"
        ))
        .bind(request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quote_response).collect::<Result<Vec<_>, _>>()
    }

    async fn list_pending(
        &self,
        vendor_id: Option<VendorId>,
    ) -> Result<Vec<QuoteResponse>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(vendor) = vendor_id {
            sqlx::query(&format!(
                "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response
                 WHERE status = 'PENDING' AND vendor_id = ?
                 ORDER BY created_at DESC"
            ))
            .bind(vendor.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response
                 WHERE status = 'PENDING'
                 ORDER BY created_at DESC"
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_quote_response).collect::<Result<Vec<_>, _>>()
    }
}
