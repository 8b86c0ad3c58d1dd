use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::party::{UserId, VendorId};
use crate::domain::quote::{QuoteRequestId, QuoteResponseId};
use crate::domain::response::ConsentStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipmentId(pub i64);

/// Delivery-progress lifecycle. Distinct from [`BookingStatus`], which tracks
/// carrier confirmation only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Requested,
    Pending,
    Assigned,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    Rejected,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::Accepted => "ACCEPTED",
            Self::PickedUp => "PICKED_UP",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "REQUESTED" => Some(Self::Requested),
            "PENDING" => Some(Self::Pending),
            "ASSIGNED" => Some(Self::Assigned),
            "ACCEPTED" => Some(Self::Accepted),
            "PICKED_UP" => Some(Self::PickedUp),
            "IN_TRANSIT" => Some(Self::InTransit),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    PendingTransporter,
    Confirmed,
    Declined,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingTransporter => "PENDING_TRANSPORTER",
            Self::Confirmed => "CONFIRMED",
            Self::Declined => "DECLINED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING_TRANSPORTER" => Some(Self::PendingTransporter),
            "CONFIRMED" => Some(Self::Confirmed),
            "DECLINED" => Some(Self::Declined),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Booking outcome implied by a terminal consent state.
    pub fn from_consent(consent: ConsentStatus) -> Option<Self> {
        match consent {
            ConsentStatus::Pending => None,
            ConsentStatus::Accepted => Some(Self::Confirmed),
            ConsentStatus::Declined => Some(Self::Declined),
            ConsentStatus::Expired => Some(Self::Expired),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentAction {
    Accept,
    Reject,
}

impl AssignmentAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Some(Self::Accept),
            "REJECT" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub user_id: UserId,
    pub quote_request_id: Option<QuoteRequestId>,
    pub transporter_quote_id: Option<QuoteResponseId>,
    pub selected_vendor_id: Option<VendorId>,
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
    pub cost: Option<Decimal>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub status: ShipmentStatus,
    pub booking_status: BookingStatus,
    pub tracking_number: String,
    pub transporter_responded_at: Option<DateTime<Utc>>,
    pub transporter_accepted_at: Option<DateTime<Utc>>,
    pub transporter_rejected_at: Option<DateTime<Utc>>,
    pub transporter_response_notes: Option<String>,
    pub assigned_driver: Option<String>,
    pub driver_phone: Option<String>,
    pub vehicle_type: Option<String>,
    pub vehicle_registration: Option<String>,
    pub driver_eta: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Whether the direct assignment accept/reject path is still open.
    pub fn awaiting_transporter(&self) -> bool {
        matches!(
            self.status,
            ShipmentStatus::Requested | ShipmentStatus::Pending | ShipmentStatus::Assigned
        )
    }

    pub fn route_label(&self) -> String {
        format!("{} -> {}", self.from_location, self.to_location)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::response::ConsentStatus;

    use super::{BookingStatus, ShipmentStatus};

    #[test]
    fn booking_status_round_trips_through_storage_form() {
        for status in [
            BookingStatus::PendingTransporter,
            BookingStatus::Confirmed,
            BookingStatus::Declined,
            BookingStatus::Expired,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn consent_outcomes_map_onto_booking_status() {
        assert_eq!(
            BookingStatus::from_consent(ConsentStatus::Accepted),
            Some(BookingStatus::Confirmed)
        );
        assert_eq!(
            BookingStatus::from_consent(ConsentStatus::Declined),
            Some(BookingStatus::Declined)
        );
        assert_eq!(
            BookingStatus::from_consent(ConsentStatus::Expired),
            Some(BookingStatus::Expired)
        );
        assert_eq!(BookingStatus::from_consent(ConsentStatus::Pending), None);
    }

    #[test]
    fn shipment_status_parse_rejects_unknown_values() {
        assert_eq!(ShipmentStatus::parse("TELEPORTED"), None);
        assert_eq!(ShipmentStatus::parse("in_transit"), Some(ShipmentStatus::InTransit));
    }
}
