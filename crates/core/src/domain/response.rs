use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::party::VendorId;
use crate::domain::quote::{QuoteRequestId, QuoteResponseId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteResponseStatus {
    Pending,
    Responded,
    Declined,
    Approved,
}

impl QuoteResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Responded => "RESPONDED",
            Self::Declined => "DECLINED",
            Self::Approved => "APPROVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "RESPONDED" => Some(Self::Responded),
            "DECLINED" => Some(Self::Declined),
            "APPROVED" => Some(Self::Approved),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl ConsentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "ACCEPTED" => Some(Self::Accepted),
            "DECLINED" => Some(Self::Declined),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentSource {
    TransporterPortal,
    TransporterApp,
    System,
}

impl ConsentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransporterPortal => "TRANSPORTER_PORTAL",
            Self::TransporterApp => "TRANSPORTER_APP",
            Self::System => "SYSTEM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRANSPORTER_PORTAL" => Some(Self::TransporterPortal),
            "TRANSPORTER_APP" => Some(Self::TransporterApp),
            "SYSTEM" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentAction {
    Accept,
    Decline,
}

impl ConsentAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Some(Self::Accept),
            "DECLINE" => Some(Self::Decline),
            _ => None,
        }
    }
}

/// Outcome of evaluating a consent submission against the current sub-state.
/// Expiry takes precedence over the requested action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsentDecision {
    /// Consent is gated on the bid being APPROVED first.
    NotApproved,
    AlreadyDecided(ConsentStatus),
    /// The SLA window elapsed; the transition is forced to EXPIRED.
    Expired,
    Record(ConsentStatus),
}

/// One carrier's bid against a quote request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub id: QuoteResponseId,
    pub quote_request_id: QuoteRequestId,
    pub vendor_id: VendorId,
    pub status: QuoteResponseStatus,
    pub quoted_price: Option<Decimal>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub transporter_notes: Option<String>,
    pub consent_status: ConsentStatus,
    pub consent_at: Option<DateTime<Utc>>,
    pub consent_source: Option<ConsentSource>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteResponse {
    pub fn can_transition_to(&self, next: QuoteResponseStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteResponseStatus::Pending, QuoteResponseStatus::Responded)
                | (QuoteResponseStatus::Pending, QuoteResponseStatus::Declined)
                | (QuoteResponseStatus::Responded, QuoteResponseStatus::Approved)
        )
    }

    pub fn transition_to(&mut self, next: QuoteResponseStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidResponseTransition { from: self.status, to: next })
    }

    /// Whether the bid carries everything an approval needs.
    pub fn ready_for_approval(&self) -> bool {
        self.status == QuoteResponseStatus::Responded
            && self.quoted_price.is_some()
            && self.estimated_delivery.is_some()
    }

    pub fn consent_decision(&self, action: ConsentAction, now: DateTime<Utc>) -> ConsentDecision {
        if self.status != QuoteResponseStatus::Approved {
            return ConsentDecision::NotApproved;
        }
        if self.consent_status != ConsentStatus::Pending {
            return ConsentDecision::AlreadyDecided(self.consent_status);
        }
        if self.expires_at.is_some_and(|deadline| deadline < now) {
            return ConsentDecision::Expired;
        }
        match action {
            ConsentAction::Accept => ConsentDecision::Record(ConsentStatus::Accepted),
            ConsentAction::Decline => ConsentDecision::Record(ConsentStatus::Declined),
        }
    }
}
