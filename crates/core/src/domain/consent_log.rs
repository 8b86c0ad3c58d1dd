use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::party::UserId;
use crate::domain::quote::QuoteResponseId;
use crate::domain::response::ConsentStatus;
use crate::domain::shipment::ShipmentId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentActor {
    System,
    Admin,
    Transporter,
}

impl ConsentActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Admin => "ADMIN",
            Self::Transporter => "TRANSPORTER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SYSTEM" => Some(Self::System),
            "ADMIN" => Some(Self::Admin),
            "TRANSPORTER" => Some(Self::Transporter),
            _ => None,
        }
    }
}

/// Immutable audit record of one consent-state transition attempt. Rows are
/// only ever inserted; updates and deletes are not part of the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentLogEntry {
    pub id: i64,
    pub quote_response_id: QuoteResponseId,
    pub shipment_id: Option<ShipmentId>,
    pub status_before: ConsentStatus,
    pub status_after: ConsentStatus,
    pub actor_type: ConsentActor,
    pub actor_id: Option<UserId>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
