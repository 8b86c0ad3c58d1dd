use sqlx::Row;

use lanehaul_core::domain::party::{UserId, VendorId};
use lanehaul_core::domain::quote::{QuoteRequestId, QuoteResponseId};
use lanehaul_core::domain::shipment::{BookingStatus, Shipment, ShipmentId, ShipmentStatus};

use super::{
    parse_optional_datetime, parse_optional_decimal, parse_required_datetime, parse_stored,
    RepositoryError, ShipmentRepository,
};
use crate::DbPool;

pub(crate) const SHIPMENT_COLUMNS: &str = "id, user_id, quote_request_id, transporter_quote_id, \
     selected_vendor_id, from_location, to_location, from_lat, from_lng, to_lat, to_lng, \
     weight_kg, shipment_type, urgency, notes, cost, estimated_delivery, status, booking_status, \
     tracking_number, transporter_responded_at, transporter_accepted_at, transporter_rejected_at, \
     transporter_response_notes, assigned_driver, driver_phone, vehicle_type, \
     vehicle_registration, driver_eta, created_at, updated_at";

pub struct SqlShipmentRepository {
    pool: DbPool,
}

impl SqlShipmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_shipment(row: &sqlx::sqlite::SqliteRow) -> Result<Shipment, RepositoryError> {
    let decode = |err: sqlx::Error| RepositoryError::Decode(err.to_string());

    let status_str: String = row.try_get("status").map_err(decode)?;
    let booking_status_str: String = row.try_get("booking_status").map_err(decode)?;
    let cost_str: Option<String> = row.try_get("cost").map_err(decode)?;
    let estimated_delivery_str: Option<String> =
        row.try_get("estimated_delivery").map_err(decode)?;
    let responded_at_str: Option<String> =
        row.try_get("transporter_responded_at").map_err(decode)?;
    let accepted_at_str: Option<String> = row.try_get("transporter_accepted_at").map_err(decode)?;
    let rejected_at_str: Option<String> = row.try_get("transporter_rejected_at").map_err(decode)?;
    let driver_eta_str: Option<String> = row.try_get("driver_eta").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    Ok(Shipment {
        id: ShipmentId(row.try_get("id").map_err(decode)?),
        user_id: UserId(row.try_get("user_id").map_err(decode)?),
        quote_request_id: row
            .try_get::<Option<i64>, _>("quote_request_id")
            .map_err(decode)?
            .map(QuoteRequestId),
        transporter_quote_id: row
            .try_get::<Option<i64>, _>("transporter_quote_id")
            .map_err(decode)?
            .map(QuoteResponseId),
        selected_vendor_id: row
            .try_get::<Option<i64>, _>("selected_vendor_id")
            .map_err(decode)?
            .map(VendorId),
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
        cost: parse_optional_decimal("shipment.cost", cost_str)?,
        estimated_delivery: parse_optional_datetime(
            "shipment.estimated_delivery",
            estimated_delivery_str,
        )?,
        status: parse_stored("shipment.status", &status_str, ShipmentStatus::parse)?,
        booking_status: parse_stored(
            "shipment.booking_status",
            &booking_status_str,
            BookingStatus::parse,
        )?,
        tracking_number: row.try_get("tracking_number").map_err(decode)?,
        transporter_responded_at: parse_optional_datetime(
            "shipment.transporter_responded_at",
            responded_at_str,
        )?,
        transporter_accepted_at: parse_optional_datetime(
            "shipment.transporter_accepted_at",
            accepted_at_str,
        )?,
        transporter_rejected_at: parse_optional_datetime(
            "shipment.transporter_rejected_at",
            rejected_at_str,
        )?,
        transporter_response_notes: row.try_get("transporter_response_notes").map_err(decode)?,
        assigned_driver: row.try_get("assigned_driver").map_err(decode)?,
        driver_phone: row.try_get("driver_phone").map_err(decode)?,
        vehicle_type: row.try_get("vehicle_type").map_err(decode)?,
        vehicle_registration: row.try_get("vehicle_registration").map_err(decode)?,
        driver_eta: parse_optional_datetime("shipment.driver_eta", driver_eta_str)?,
        created_at: parse_required_datetime("shipment.created_at", created_at_str)?,
        updated_at: parse_required_datetime("shipment.updated_at", updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl ShipmentRepository for SqlShipmentRepository {
    async fn find_by_id(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {SHIPMENT_COLUMNS} FROM shipment WHERE id = ?"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_shipment(r)?)),
            None => Ok(None),
        }
    }

    async fn list_awaiting(
        &self,
        vendor_id: Option<VendorId>,
    ) -> Result<Vec<Shipment>, RepositoryError> {
        let awaiting_clause = "(booking_status = 'PENDING_TRANSPORTER' \
             OR status IN ('REQUESTED', 'PENDING', 'ASSIGNED'))";

        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(vendor) = vendor_id {
            sqlx::query(&format!(
                "SELECT {SHIPMENT_COLUMNS} FROM shipment
                 WHERE {awaiting_clause} AND selected_vendor_id = ?
                 ORDER BY created_at DESC"
            ))
            .bind(vendor.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {SHIPMENT_COLUMNS} FROM shipment
                 WHERE {awaiting_clause}
                 ORDER BY created_at DESC"
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_shipment).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use lanehaul_core::domain::shipment::{BookingStatus, ShipmentStatus};

    use super::SqlShipmentRepository;
    use crate::fixtures::{seed_shipment, seed_user, seed_vendor, test_pool};
    use crate::repositories::ShipmentRepository;

    #[tokio::test]
    async fn find_by_id_round_trips_the_shipment() {
        let pool = test_pool().await;
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let vendor = seed_vendor(&pool, "Sharma Logistics", true).await;
        let shipment_id = seed_shipment(&pool, shipper, Some(vendor), "REQUESTED").await;

        let repo = SqlShipmentRepository::new(pool);
        let found = repo.find_by_id(shipment_id).await.expect("find").expect("should exist");

        assert_eq!(found.id, shipment_id);
        assert_eq!(found.selected_vendor_id, Some(vendor));
        assert_eq!(found.status, ShipmentStatus::Requested);
        assert_eq!(found.booking_status, BookingStatus::PendingTransporter);
        assert!(found.tracking_number.starts_with("LH-"));
    }

    #[tokio::test]
    async fn list_awaiting_excludes_settled_shipments() {
        let pool = test_pool().await;
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let vendor = seed_vendor(&pool, "Sharma Logistics", true).await;
        let open = seed_shipment(&pool, shipper, Some(vendor), "REQUESTED").await;
        let _delivered = seed_shipment(&pool, shipper, Some(vendor), "DELIVERED").await;

        let repo = SqlShipmentRepository::new(pool);
        let awaiting = repo.list_awaiting(Some(vendor)).await.expect("list awaiting");

        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].id, open);
    }
}
