//! Post-commit glue: outcome structs become outbound events and best-effort
//! sync-queue records. Nothing here can fail the originating request.

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use lanehaul_core::domain::party::{UserId, VendorId};
use lanehaul_db::repositories::{
    NotificationRepository, PartyRepository, SqlNotificationRepository, SqlPartyRepository,
    SqlSyncQueueRepository, SyncQueueRepository,
};
use lanehaul_db::{
    ApprovalOutcome, BidOutcome, ConsentOutcome, ExpiredConsent, NewNotification, NewSyncRecord,
    QuoteCreation,
};
use lanehaul_notify::{InAppNote, InAppSink, OutboundEvent, SinkError, UserRecipient, VendorRecipient};

/// In-app sink backed by the notification table; vendor fan-out resolves the
/// carrier's active users at delivery time.
pub struct SqlInAppSink {
    notifications: SqlNotificationRepository,
    parties: SqlPartyRepository,
}

impl SqlInAppSink {
    pub fn new(notifications: SqlNotificationRepository, parties: SqlPartyRepository) -> Self {
        Self { notifications, parties }
    }
}

#[async_trait]
impl InAppSink for SqlInAppSink {
    async fn notify_user(&self, user_id: UserId, note: InAppNote) -> Result<(), SinkError> {
        self.notifications
            .create(NewNotification {
                user_id,
                title: note.title,
                message: note.message,
                kind: note.kind,
                metadata: note.metadata,
            })
            .await
            .map_err(|err| SinkError::Sink(err.to_string()))?;
        Ok(())
    }

    async fn notify_vendor_users(
        &self,
        vendor_id: VendorId,
        note: InAppNote,
    ) -> Result<(), SinkError> {
        let users = self
            .parties
            .list_active_vendor_users(vendor_id)
            .await
            .map_err(|err| SinkError::Sink(err.to_string()))?;

        for user in users {
            self.notifications
                .create(NewNotification {
                    user_id: user.id,
                    title: note.title.clone(),
                    message: note.message.clone(),
                    kind: note.kind.clone(),
                    metadata: note.metadata.clone(),
                })
                .await
                .map_err(|err| SinkError::Sink(err.to_string()))?;
        }

        Ok(())
    }
}

/// Enqueue an outbound sync record; a failure is logged and swallowed.
pub async fn enqueue_sync(repo: &SqlSyncQueueRepository, record: NewSyncRecord) {
    if let Err(err) = repo.enqueue(record).await {
        warn!(
            event_name = "sync.enqueue.failed",
            error = %err,
            "failed to enqueue sync record"
        );
    }
}

pub fn quote_created_event(outcome: &QuoteCreation) -> OutboundEvent {
    OutboundEvent::QuoteInvitation {
        quote_request_id: outcome.request.id.0,
        route: outcome.request.route_label(),
        weight_kg: outcome.request.weight_kg,
        shipment_type: outcome.request.shipment_type.clone(),
        urgency: outcome.request.urgency.clone(),
        notes: outcome.request.notes.clone(),
        shipper_name: outcome.requester.name.clone(),
        vendors: outcome
            .vendors
            .iter()
            .map(|vendor| VendorRecipient { vendor_id: vendor.id, contact: vendor.contact() })
            .collect(),
    }
}

pub fn quote_created_sync(outcome: &QuoteCreation) -> NewSyncRecord {
    NewSyncRecord {
        entity_type: "QUOTE_REQUEST".to_string(),
        entity_id: Some(outcome.request.id.0.to_string()),
        action: "CREATE_QUOTE_REQUEST".to_string(),
        payload: json!({
            "fromLocation": outcome.request.from_location,
            "toLocation": outcome.request.to_location,
            "weightKg": outcome.request.weight_kg,
            "vendorIds": outcome.vendors.iter().map(|vendor| vendor.id.0).collect::<Vec<_>>(),
            "createdByUserId": outcome.request.created_by_user_id.0,
        }),
    }
}

pub fn bid_event(outcome: &BidOutcome) -> OutboundEvent {
    OutboundEvent::BidReceived {
        quote_request_id: outcome.request.id.0,
        quote_response_id: outcome.response.id.0,
        route: outcome.request.route_label(),
        declined: outcome.declined,
        quoted_price: outcome.response.quoted_price,
        estimated_delivery: outcome.response.estimated_delivery,
        notes: outcome.response.transporter_notes.clone(),
        requester: UserRecipient {
            user_id: outcome.requester.id,
            contact: outcome.requester.contact(),
        },
    }
}

pub fn bid_sync(outcome: &BidOutcome) -> NewSyncRecord {
    NewSyncRecord {
        entity_type: "QUOTE_RESPONSE".to_string(),
        entity_id: Some(outcome.response.id.0.to_string()),
        action: if outcome.declined {
            "DECLINE_QUOTE_RESPONSE".to_string()
        } else {
            "RESPOND_QUOTE_RESPONSE".to_string()
        },
        payload: json!({
            "quoteRequestId": outcome.request.id.0,
            "quotedPrice": outcome.response.quoted_price.map(|price| price.to_string()),
            "estimatedDelivery": outcome
                .response
                .estimated_delivery
                .map(|delivery| delivery.to_rfc3339()),
        }),
    }
}

pub fn approval_event(outcome: &ApprovalOutcome) -> Option<OutboundEvent> {
    let (quoted_price, estimated_delivery, expires_at) = match (
        outcome.response.quoted_price,
        outcome.response.estimated_delivery,
        outcome.response.expires_at,
    ) {
        (Some(price), Some(delivery), Some(deadline)) => (price, delivery, deadline),
        _ => return None,
    };

    Some(OutboundEvent::ConsentRequested {
        shipment_id: outcome.shipment.id.0,
        quote_response_id: outcome.response.id.0,
        tracking_number: outcome.shipment.tracking_number.clone(),
        route: outcome.shipment.route_label(),
        quoted_price,
        estimated_delivery,
        expires_at,
        vendor: VendorRecipient {
            vendor_id: outcome.vendor.id,
            contact: outcome.vendor.contact(),
        },
        requester: UserRecipient {
            user_id: outcome.requester.id,
            contact: outcome.requester.contact(),
        },
    })
}

pub fn approval_sync(outcome: &ApprovalOutcome) -> NewSyncRecord {
    NewSyncRecord {
        entity_type: "QUOTE_REQUEST".to_string(),
        entity_id: Some(outcome.request.id.0.to_string()),
        action: "APPROVE_QUOTE_RESPONSE".to_string(),
        payload: json!({
            "quoteRequestId": outcome.request.id.0,
            "responseId": outcome.response.id.0,
            "shipmentId": outcome.shipment.id.0,
        }),
    }
}

pub fn consent_event(outcome: &ConsentOutcome) -> OutboundEvent {
    OutboundEvent::ConsentRecorded {
        shipment_id: outcome.shipment.as_ref().map(|shipment| shipment.id.0),
        quote_response_id: outcome.response.id.0,
        tracking_number: outcome
            .shipment
            .as_ref()
            .map(|shipment| shipment.tracking_number.clone()),
        route: outcome
            .shipment
            .as_ref()
            .map(|shipment| shipment.route_label())
            .unwrap_or_default(),
        accepted: outcome.recorded == lanehaul_core::ConsentStatus::Accepted,
        note: outcome.response.transporter_notes.clone(),
        actioned_at: outcome.response.consent_at.unwrap_or_else(chrono::Utc::now),
        vendor: VendorRecipient {
            vendor_id: outcome.vendor.id,
            contact: outcome.vendor.contact(),
        },
        requester: UserRecipient {
            user_id: outcome.requester.id,
            contact: outcome.requester.contact(),
        },
    }
}

pub fn consent_sync(outcome: &ConsentOutcome) -> NewSyncRecord {
    NewSyncRecord {
        entity_type: "QUOTE_RESPONSE".to_string(),
        entity_id: Some(outcome.response.id.0.to_string()),
        action: "RECORD_BOOKING_CONSENT".to_string(),
        payload: json!({
            "consentStatus": outcome.recorded.as_str(),
            "shipmentId": outcome.shipment.as_ref().map(|shipment| shipment.id.0),
        }),
    }
}

pub fn assignment_event(
    shipment: &lanehaul_core::Shipment,
    requester: &lanehaul_core::User,
    accepted: bool,
) -> OutboundEvent {
    OutboundEvent::AssignmentDecided {
        shipment_id: shipment.id.0,
        tracking_number: shipment.tracking_number.clone(),
        route: shipment.route_label(),
        accepted,
        requester: UserRecipient { user_id: requester.id, contact: requester.contact() },
    }
}

pub fn assignment_sync(shipment_id: i64, accepted: bool, notes: Option<&str>) -> NewSyncRecord {
    NewSyncRecord {
        entity_type: "SHIPMENT".to_string(),
        entity_id: Some(shipment_id.to_string()),
        action: if accepted {
            "ACCEPT_ASSIGNMENT".to_string()
        } else {
            "REJECT_ASSIGNMENT".to_string()
        },
        payload: json!({ "shipmentId": shipment_id, "notes": notes }),
    }
}

pub fn driver_event(
    shipment: &lanehaul_core::Shipment,
    requester: &lanehaul_core::User,
) -> OutboundEvent {
    OutboundEvent::DriverAssigned {
        shipment_id: shipment.id.0,
        tracking_number: shipment.tracking_number.clone(),
        driver_name: shipment.assigned_driver.clone().unwrap_or_default(),
        driver_phone: shipment.driver_phone.clone().unwrap_or_default(),
        vehicle_registration: shipment.vehicle_registration.clone().unwrap_or_default(),
        requester: UserRecipient { user_id: requester.id, contact: requester.contact() },
    }
}

pub fn driver_sync(shipment: &lanehaul_core::Shipment) -> NewSyncRecord {
    NewSyncRecord {
        entity_type: "SHIPMENT".to_string(),
        entity_id: Some(shipment.id.0.to_string()),
        action: "UPDATE_DRIVER_INFO".to_string(),
        payload: json!({
            "shipmentId": shipment.id.0,
            "driverName": shipment.assigned_driver,
            "driverPhone": shipment.driver_phone,
        }),
    }
}

pub fn expired_event(outcome: &ExpiredConsent) -> OutboundEvent {
    OutboundEvent::ConsentExpired {
        shipment_id: outcome.shipment.as_ref().map(|shipment| shipment.id.0),
        quote_response_id: outcome.response.id.0,
        route: outcome
            .shipment
            .as_ref()
            .map(|shipment| shipment.route_label())
            .unwrap_or_default(),
        vendor: VendorRecipient {
            vendor_id: outcome.vendor.id,
            contact: outcome.vendor.contact(),
        },
        requester: UserRecipient {
            user_id: outcome.requester.id,
            contact: outcome.requester.contact(),
        },
    }
}
