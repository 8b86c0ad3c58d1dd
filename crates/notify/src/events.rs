use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lanehaul_core::domain::party::{Contact, UserId, VendorId};

/// Contact snapshot for a carrier organisation taken at commit time, so the
/// dispatcher never re-reads mutable state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRecipient {
    pub vendor_id: VendorId,
    pub contact: Contact,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecipient {
    pub user_id: UserId,
    pub contact: Contact,
}

/// One committed lifecycle transition worth telling somebody about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OutboundEvent {
    QuoteInvitation {
        quote_request_id: i64,
        route: String,
        weight_kg: f64,
        shipment_type: String,
        urgency: String,
        notes: Option<String>,
        shipper_name: String,
        vendors: Vec<VendorRecipient>,
    },
    BidReceived {
        quote_request_id: i64,
        quote_response_id: i64,
        route: String,
        declined: bool,
        quoted_price: Option<Decimal>,
        estimated_delivery: Option<DateTime<Utc>>,
        notes: Option<String>,
        requester: UserRecipient,
    },
    ConsentRequested {
        shipment_id: i64,
        quote_response_id: i64,
        tracking_number: String,
        route: String,
        quoted_price: Decimal,
        estimated_delivery: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        vendor: VendorRecipient,
        requester: UserRecipient,
    },
    ConsentRecorded {
        shipment_id: Option<i64>,
        quote_response_id: i64,
        tracking_number: Option<String>,
        route: String,
        accepted: bool,
        note: Option<String>,
        actioned_at: DateTime<Utc>,
        vendor: VendorRecipient,
        requester: UserRecipient,
    },
    ConsentExpired {
        shipment_id: Option<i64>,
        quote_response_id: i64,
        route: String,
        vendor: VendorRecipient,
        requester: UserRecipient,
    },
    AssignmentDecided {
        shipment_id: i64,
        tracking_number: String,
        route: String,
        accepted: bool,
        requester: UserRecipient,
    },
    DriverAssigned {
        shipment_id: i64,
        tracking_number: String,
        driver_name: String,
        driver_phone: String,
        vehicle_registration: String,
        requester: UserRecipient,
    },
}

impl OutboundEvent {
    /// Stable name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QuoteInvitation { .. } => "quote_invitation",
            Self::BidReceived { .. } => "bid_received",
            Self::ConsentRequested { .. } => "consent_requested",
            Self::ConsentRecorded { .. } => "consent_recorded",
            Self::ConsentExpired { .. } => "consent_expired",
            Self::AssignmentDecided { .. } => "assignment_decided",
            Self::DriverAssigned { .. } => "driver_assigned",
        }
    }
}

pub(crate) fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format("%d %b %Y, %H:%M UTC").to_string()
}
