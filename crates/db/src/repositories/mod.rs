use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use lanehaul_core::domain::consent_log::ConsentLogEntry;
use lanehaul_core::domain::party::{User, UserId, Vendor, VendorId};
use lanehaul_core::domain::quote::{QuoteRequest, QuoteRequestId, QuoteResponseId};
use lanehaul_core::domain::response::QuoteResponse;
use lanehaul_core::domain::shipment::{Shipment, ShipmentId};
use lanehaul_core::policy::ListScope;

pub mod consent_log;
pub mod notification;
pub mod party;
pub mod quote_request;
pub mod quote_response;
pub mod shipment;
pub mod sync_queue;

pub use consent_log::SqlConsentLogRepository;
pub use notification::{NewNotification, NotificationRecord, SqlNotificationRepository};
pub use party::SqlPartyRepository;
pub use quote_request::SqlQuoteRequestRepository;
pub use quote_response::SqlQuoteResponseRepository;
pub use shipment::SqlShipmentRepository;
pub use sync_queue::{NewSyncRecord, SqlSyncQueueRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait QuoteRequestRepository: Send + Sync {
    async fn find_by_id(&self, id: QuoteRequestId)
        -> Result<Option<QuoteRequest>, RepositoryError>;
    async fn list(&self, scope: ListScope) -> Result<Vec<QuoteRequest>, RepositoryError>;
}

#[async_trait]
pub trait QuoteResponseRepository: Send + Sync {
    async fn find_by_id(&self, id: QuoteResponseId)
        -> Result<Option<QuoteResponse>, RepositoryError>;
    async fn list_for_request(
        &self,
        request_id: QuoteRequestId,
    ) -> Result<Vec<QuoteResponse>, RepositoryError>;
    async fn list_pending(
        &self,
        vendor_id: Option<VendorId>,
    ) -> Result<Vec<QuoteResponse>, RepositoryError>;
}

#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    async fn find_by_id(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError>;
    async fn list_awaiting(
        &self,
        vendor_id: Option<VendorId>,
    ) -> Result<Vec<Shipment>, RepositoryError>;
}

#[async_trait]
pub trait ConsentLogRepository: Send + Sync {
    /// Newest first.
    async fn list_for_response(
        &self,
        response_id: QuoteResponseId,
    ) -> Result<Vec<ConsentLogEntry>, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<i64, RepositoryError>;
    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<NotificationRecord>, RepositoryError>;
}

#[async_trait]
pub trait SyncQueueRepository: Send + Sync {
    async fn enqueue(&self, record: NewSyncRecord) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait PartyRepository: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_vendor(&self, id: VendorId) -> Result<Option<Vendor>, RepositoryError>;
    async fn list_active_vendors(&self, ids: &[i64]) -> Result<Vec<Vendor>, RepositoryError>;
    async fn list_active_vendor_users(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<User>, RepositoryError>;
}

pub(crate) fn parse_required_datetime(
    field: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("{field}: {err}")))
}

pub(crate) fn parse_optional_datetime(
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|raw| parse_required_datetime(field, raw)).transpose()
}

pub(crate) fn parse_optional_decimal(
    field: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value
        .map(|raw| {
            raw.parse::<Decimal>()
                .map_err(|err| RepositoryError::Decode(format!("{field}: {err}")))
        })
        .transpose()
}

pub(crate) fn parse_stored<T>(
    field: &str,
    value: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, RepositoryError> {
    parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("{field}: unknown value `{value}`")))
}
