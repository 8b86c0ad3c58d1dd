//! Seed helpers for integration tests and local smoke runs.

use chrono::Utc;

use lanehaul_core::domain::party::{UserId, VendorId};
use lanehaul_core::domain::quote::{QuoteRequestId, QuoteResponseId};
use lanehaul_core::domain::shipment::ShipmentId;

use crate::{connect_with_settings, migrations, DbPool};

/// Fresh in-memory database with migrations applied.
pub async fn test_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

pub async fn seed_vendor(pool: &DbPool, name: &str, is_active: bool) -> VendorId {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO vendor (name, email, phone, rating, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(format!("{}@carriers.example", name.to_lowercase().replace(' ', ".")))
    .bind("+91-98000-00000")
    .bind(4.2_f64)
    .bind(is_active as i64)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("seed vendor");

    VendorId(result.last_insert_rowid())
}

pub async fn seed_user(
    pool: &DbPool,
    name: &str,
    role: &str,
    company_id: Option<i64>,
    vendor_id: Option<VendorId>,
) -> UserId {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO app_user (name, email, phone, role, company_id, vendor_id, is_active,
                               created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(name)
    .bind(format!("{}@lanehaul.example", name.to_lowercase()))
    .bind("+91-99000-00000")
    .bind(role)
    .bind(company_id)
    .bind(vendor_id.map(|id| id.0))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("seed user");

    UserId(result.last_insert_rowid())
}

/// Active transporter user linked to the given vendor.
pub async fn seed_vendor_user(pool: &DbPool, name: &str, vendor_id: VendorId) -> UserId {
    seed_user(pool, name, "TRANSPORTER", None, Some(vendor_id)).await
}

pub async fn seed_quote_request(
    pool: &DbPool,
    created_by: UserId,
    from_location: &str,
    to_location: &str,
) -> QuoteRequestId {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO quote_request (created_by_user_id, from_location, to_location, weight_kg,
                                    shipment_type, urgency, status, created_at, updated_at)
         VALUES (?, ?, ?, 1200.0, 'FTL', 'STANDARD', 'PENDING', ?, ?)",
    )
    .bind(created_by.0)
    .bind(from_location)
    .bind(to_location)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("seed quote request");

    QuoteRequestId(result.last_insert_rowid())
}

pub async fn seed_quote_response(
    pool: &DbPool,
    request_id: QuoteRequestId,
    vendor_id: VendorId,
) -> QuoteResponseId {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO quote_response (quote_request_id, vendor_id, status, consent_status,
                                     created_at, updated_at)
         VALUES (?, ?, 'PENDING', 'PENDING', ?, ?)",
    )
    .bind(request_id.0)
    .bind(vendor_id.0)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("seed quote response");

    QuoteResponseId(result.last_insert_rowid())
}

pub async fn seed_shipment(
    pool: &DbPool,
    user_id: UserId,
    vendor_id: Option<VendorId>,
    status: &str,
) -> ShipmentId {
    let now = Utc::now().to_rfc3339();
    let booking_status = match status {
        "REQUESTED" | "PENDING" | "ASSIGNED" => "PENDING_TRANSPORTER",
        "REJECTED" | "CANCELLED" => "DECLINED",
        _ => "CONFIRMED",
    };
    let tracking = format!("LH-{}", uuid::Uuid::new_v4().simple());

    let result = sqlx::query(
        "INSERT INTO shipment (user_id, selected_vendor_id, from_location, to_location,
                               weight_kg, shipment_type, urgency, status, booking_status,
                               tracking_number, created_at, updated_at)
         VALUES (?, ?, 'Pune', 'Nagpur', 1200.0, 'FTL', 'STANDARD', ?, ?, ?, ?, ?)",
    )
    .bind(user_id.0)
    .bind(vendor_id.map(|id| id.0))
    .bind(status)
    .bind(booking_status)
    .bind(&tracking)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("seed shipment");

    ShipmentId(result.last_insert_rowid())
}
