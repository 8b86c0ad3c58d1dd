use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::party::UserId;
use crate::domain::response::QuoteResponseStatus;
use crate::domain::shipment::ShipmentId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteRequestId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteResponseId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteRequestStatus {
    Pending,
    Responded,
    Approved,
    Closed,
}

impl QuoteRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Responded => "RESPONDED",
            Self::Approved => "APPROVED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "RESPONDED" => Some(Self::Responded),
            "APPROVED" => Some(Self::Approved),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Route and load parameters a shipper solicits bids for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: QuoteRequestId,
    pub created_by_user_id: UserId,
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
    pub status: QuoteRequestStatus,
    pub approved_response_id: Option<QuoteResponseId>,
    pub shipment_id: Option<ShipmentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteRequest {
    pub fn can_transition_to(&self, next: QuoteRequestStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteRequestStatus::Pending, QuoteRequestStatus::Responded)
                | (QuoteRequestStatus::Pending, QuoteRequestStatus::Closed)
                | (QuoteRequestStatus::Responded, QuoteRequestStatus::Approved)
                | (QuoteRequestStatus::Responded, QuoteRequestStatus::Closed)
        )
    }

    pub fn transition_to(&mut self, next: QuoteRequestStatus) -> Result<(), DomainError> {
        if self.status == next || self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuoteTransition { from: self.status, to: next })
    }

    pub fn route_label(&self) -> String {
        format!("{} -> {}", self.from_location, self.to_location)
    }
}

/// Parent-request status after one bid changed, given the full sibling set
/// (including the just-updated response). A single RESPONDED bid pins the
/// request at RESPONDED; only a unanimous DECLINED set closes it.
pub fn status_after_bid(
    current: QuoteRequestStatus,
    siblings: &[QuoteResponseStatus],
) -> QuoteRequestStatus {
    if matches!(current, QuoteRequestStatus::Approved | QuoteRequestStatus::Closed) {
        return current;
    }
    if siblings.iter().any(|status| *status == QuoteResponseStatus::Responded) {
        return QuoteRequestStatus::Responded;
    }
    if !siblings.is_empty() && siblings.iter().all(|status| *status == QuoteResponseStatus::Declined)
    {
        return QuoteRequestStatus::Closed;
    }
    current
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::party::UserId;
    use crate::domain::response::QuoteResponseStatus;

    use super::{status_after_bid, QuoteRequest, QuoteRequestId, QuoteRequestStatus};

    fn request(status: QuoteRequestStatus) -> QuoteRequest {
        let now = Utc::now();
        QuoteRequest {
            id: QuoteRequestId(1),
            created_by_user_id: UserId(7),
            from_location: "Pune".to_string(),
            to_location: "Nagpur".to_string(),
            from_lat: None,
            from_lng: None,
            to_lat: None,
            to_lng: None,
            weight_kg: 1200.0,
            shipment_type: "FTL".to_string(),
            urgency: "STANDARD".to_string(),
            notes: None,
            status,
            approved_response_id: None,
            shipment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn allows_pending_to_responded() {
        let mut quote = request(QuoteRequestStatus::Pending);
        quote.transition_to(QuoteRequestStatus::Responded).expect("pending -> responded");
        assert_eq!(quote.status, QuoteRequestStatus::Responded);
    }

    #[test]
    fn blocks_pending_to_approved() {
        let mut quote = request(QuoteRequestStatus::Pending);
        let error = quote
            .transition_to(QuoteRequestStatus::Approved)
            .expect_err("pending -> approved should fail");
        assert!(matches!(error, crate::errors::DomainError::InvalidQuoteTransition { .. }));
    }

    #[test]
    fn one_responded_sibling_wins_over_declines() {
        let siblings = [QuoteResponseStatus::Declined, QuoteResponseStatus::Responded];
        assert_eq!(
            status_after_bid(QuoteRequestStatus::Pending, &siblings),
            QuoteRequestStatus::Responded
        );
    }

    #[test]
    fn unanimous_declines_close_the_request() {
        let siblings = [QuoteResponseStatus::Declined, QuoteResponseStatus::Declined];
        assert_eq!(
            status_after_bid(QuoteRequestStatus::Pending, &siblings),
            QuoteRequestStatus::Closed
        );
    }

    #[test]
    fn partial_declines_leave_the_request_open() {
        let siblings = [QuoteResponseStatus::Declined, QuoteResponseStatus::Pending];
        assert_eq!(
            status_after_bid(QuoteRequestStatus::Pending, &siblings),
            QuoteRequestStatus::Pending
        );
    }

    #[test]
    fn approved_requests_are_left_untouched() {
        let siblings = [QuoteResponseStatus::Declined];
        assert_eq!(
            status_after_bid(QuoteRequestStatus::Approved, &siblings),
            QuoteRequestStatus::Approved
        );
    }
}
