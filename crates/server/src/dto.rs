//! Wire representations. Enum values travel as their storage form
//! (UPPER_SNAKE) and keys as camelCase, matching the portal clients.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lanehaul_core::domain::consent_log::ConsentLogEntry;
use lanehaul_core::domain::quote::QuoteRequest;
use lanehaul_core::domain::response::QuoteResponse;
use lanehaul_core::domain::shipment::Shipment;
use lanehaul_db::NotificationRecord;

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequestDto {
    pub id: i64,
    pub created_by_user_id: i64,
    pub from_location: String,
    pub to_location: String,
    pub from_lat: Option<f64>,
    pub from_lng: Option<f64>,
    pub to_lat: Option<f64>,
    pub to_lng: Option<f64>,
    pub weight_kg: f64,
    pub shipment_type: String,
    pub urgency: String,
    pub notes: Option<String>,
    pub status: &'static str,
    pub approved_response_id: Option<i64>,
    pub shipment_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&QuoteRequest> for QuoteRequestDto {
    fn from(request: &QuoteRequest) -> Self {
        Self {
            id: request.id.0,
            created_by_user_id: request.created_by_user_id.0,
            from_location: request.from_location.clone(),
            to_location: request.to_location.clone(),
            from_lat: request.from_lat,
            from_lng: request.from_lng,
            to_lat: request.to_lat,
            to_lng: request.to_lng,
            weight_kg: request.weight_kg,
            shipment_type: request.shipment_type.clone(),
            urgency: request.urgency.clone(),
            notes: request.notes.clone(),
            status: request.status.as_str(),
            approved_response_id: request.approved_response_id.map(|id| id.0),
            shipment_id: request.shipment_id.map(|id| id.0),
            created_at: timestamp(&request.created_at),
            updated_at: timestamp(&request.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponseDto {
    pub id: i64,
    pub quote_request_id: i64,
    pub vendor_id: i64,
    pub status: &'static str,
    pub quoted_price: Option<String>,
    pub estimated_delivery: Option<String>,
    pub transporter_notes: Option<String>,
    pub consent_status: &'static str,
    pub consent_at: Option<String>,
    pub consent_source: Option<&'static str>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&QuoteResponse> for QuoteResponseDto {
    fn from(response: &QuoteResponse) -> Self {
        Self {
            id: response.id.0,
            quote_request_id: response.quote_request_id.0,
            vendor_id: response.vendor_id.0,
            status: response.status.as_str(),
            quoted_price: response.quoted_price.map(|price| price.to_string()),
            estimated_delivery: response.estimated_delivery.as_ref().map(timestamp),
            transporter_notes: response.transporter_notes.clone(),
            consent_status: response.consent_status.as_str(),
            consent_at: response.consent_at.as_ref().map(timestamp),
            consent_source: response.consent_source.map(|source| source.as_str()),
            expires_at: response.expires_at.as_ref().map(timestamp),
            created_at: timestamp(&response.created_at),
            updated_at: timestamp(&response.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDto {
    pub id: i64,
    pub user_id: i64,
    pub quote_request_id: Option<i64>,
    pub transporter_quote_id: Option<i64>,
    pub selected_vendor_id: Option<i64>,
    pub from_location: String,
    pub to_location: String,
    pub weight_kg: f64,
    pub shipment_type: String,
    pub urgency: String,
    pub notes: Option<String>,
    pub cost: Option<String>,
    pub estimated_delivery: Option<String>,
    pub status: &'static str,
    pub booking_status: &'static str,
    pub tracking_number: String,
    pub transporter_responded_at: Option<String>,
    pub transporter_accepted_at: Option<String>,
    pub transporter_rejected_at: Option<String>,
    pub transporter_response_notes: Option<String>,
    pub assigned_driver: Option<String>,
    pub driver_phone: Option<String>,
    pub vehicle_type: Option<String>,
    pub vehicle_registration: Option<String>,
    pub driver_eta: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Shipment> for ShipmentDto {
    fn from(shipment: &Shipment) -> Self {
        Self {
            id: shipment.id.0,
            user_id: shipment.user_id.0,
            quote_request_id: shipment.quote_request_id.map(|id| id.0),
            transporter_quote_id: shipment.transporter_quote_id.map(|id| id.0),
            selected_vendor_id: shipment.selected_vendor_id.map(|id| id.0),
            from_location: shipment.from_location.clone(),
            to_location: shipment.to_location.clone(),
            weight_kg: shipment.weight_kg,
            shipment_type: shipment.shipment_type.clone(),
            urgency: shipment.urgency.clone(),
            notes: shipment.notes.clone(),
            cost: shipment.cost.map(|cost| cost.to_string()),
            estimated_delivery: shipment.estimated_delivery.as_ref().map(timestamp),
            status: shipment.status.as_str(),
            booking_status: shipment.booking_status.as_str(),
            tracking_number: shipment.tracking_number.clone(),
            transporter_responded_at: shipment.transporter_responded_at.as_ref().map(timestamp),
            transporter_accepted_at: shipment.transporter_accepted_at.as_ref().map(timestamp),
            transporter_rejected_at: shipment.transporter_rejected_at.as_ref().map(timestamp),
            transporter_response_notes: shipment.transporter_response_notes.clone(),
            assigned_driver: shipment.assigned_driver.clone(),
            driver_phone: shipment.driver_phone.clone(),
            vehicle_type: shipment.vehicle_type.clone(),
            vehicle_registration: shipment.vehicle_registration.clone(),
            driver_eta: shipment.driver_eta.as_ref().map(timestamp),
            created_at: timestamp(&shipment.created_at),
            updated_at: timestamp(&shipment.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentLogDto {
    pub id: i64,
    pub quote_response_id: i64,
    pub shipment_id: Option<i64>,
    pub status_before: &'static str,
    pub status_after: &'static str,
    pub actor_type: &'static str,
    pub actor_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: String,
}

impl From<&ConsentLogEntry> for ConsentLogDto {
    fn from(entry: &ConsentLogEntry) -> Self {
        Self {
            id: entry.id,
            quote_response_id: entry.quote_response_id.0,
            shipment_id: entry.shipment_id.map(|id| id.0),
            status_before: entry.status_before.as_str(),
            status_after: entry.status_after.as_str(),
            actor_type: entry.actor_type.as_str(),
            actor_id: entry.actor_id.map(|id| id.0),
            note: entry.note.clone(),
            created_at: timestamp(&entry.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub metadata: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<&NotificationRecord> for NotificationDto {
    fn from(record: &NotificationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            message: record.message.clone(),
            kind: record.kind.clone(),
            metadata: record.metadata.clone(),
            is_read: record.is_read,
            created_at: timestamp(&record.created_at),
        }
    }
}
