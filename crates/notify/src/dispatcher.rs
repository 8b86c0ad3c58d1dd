use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tera::{Context, Tera};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use lanehaul_core::domain::party::{Contact, UserId, VendorId};

use crate::email::{EmailGateway, EmailMessage};
use crate::events::{format_datetime, OutboundEvent};
use crate::sms::{SmsGateway, SmsMessage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("in-app sink failure: {0}")]
    Sink(String),
}

/// One in-app notification row to be written for a recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InAppNote {
    pub title: String,
    pub message: String,
    pub kind: String,
    pub metadata: Option<Value>,
}

impl InAppNote {
    fn system(title: impl Into<String>, message: impl Into<String>, metadata: Value) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: "system".to_string(),
            metadata: Some(metadata),
        }
    }
}

#[async_trait]
pub trait InAppSink: Send + Sync {
    async fn notify_user(&self, user_id: UserId, note: InAppNote) -> Result<(), SinkError>;
    /// Fan a note out to every active user of a carrier organisation.
    async fn notify_vendor_users(
        &self,
        vendor_id: VendorId,
        note: InAppNote,
    ) -> Result<(), SinkError>;
}

/// Recording sink for tests.
#[derive(Clone, Default)]
pub struct InMemoryInAppSink {
    notes: Arc<Mutex<Vec<(RecipientKey, InAppNote)>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipientKey {
    User(i64),
    Vendor(i64),
}

impl InMemoryInAppSink {
    pub fn notes(&self) -> Vec<(RecipientKey, InAppNote)> {
        match self.notes.lock() {
            Ok(notes) => notes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, key: RecipientKey, note: InAppNote) {
        match self.notes.lock() {
            Ok(mut notes) => notes.push((key, note)),
            Err(poisoned) => poisoned.into_inner().push((key, note)),
        }
    }
}

#[async_trait]
impl InAppSink for InMemoryInAppSink {
    async fn notify_user(&self, user_id: UserId, note: InAppNote) -> Result<(), SinkError> {
        self.push(RecipientKey::User(user_id.0), note);
        Ok(())
    }

    async fn notify_vendor_users(
        &self,
        vendor_id: VendorId,
        note: InAppNote,
    ) -> Result<(), SinkError> {
        self.push(RecipientKey::Vendor(vendor_id.0), note);
        Ok(())
    }
}

/// Cheap clone handed to request handlers. Publishing never blocks and never
/// fails the caller; a full channel drops the event with a warning.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<OutboundEvent>,
}

impl DispatcherHandle {
    pub fn publish(&self, event: OutboundEvent) {
        let kind = event.kind();
        if let Err(err) = self.sender.try_send(event) {
            warn!(
                event_name = "notify.dispatch.dropped",
                outbound_kind = kind,
                error = %err,
                "outbound event dropped; channel unavailable"
            );
        }
    }
}

const CHANNEL_CAPACITY: usize = 256;

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(
        "quote_invitation.html",
        include_str!("../templates/quote_invitation.html"),
    )
    .ok();
    tera.add_raw_template("bid_received.html", include_str!("../templates/bid_received.html"))
        .ok();
    tera.add_raw_template(
        "consent_request.html",
        include_str!("../templates/consent_request.html"),
    )
    .ok();
    tera.add_raw_template("consent_update.html", include_str!("../templates/consent_update.html"))
        .ok();
    Arc::new(tera)
}

pub struct NotificationDispatcher {
    receiver: mpsc::Receiver<OutboundEvent>,
    in_app: Arc<dyn InAppSink>,
    email: Arc<dyn EmailGateway>,
    sms: Arc<dyn SmsGateway>,
    templates: Arc<Tera>,
}

impl NotificationDispatcher {
    pub fn new(
        in_app: Arc<dyn InAppSink>,
        email: Arc<dyn EmailGateway>,
        sms: Arc<dyn SmsGateway>,
    ) -> (Self, DispatcherHandle) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let dispatcher =
            Self { receiver, in_app, email, sms, templates: init_templates() };
        (dispatcher, DispatcherHandle { sender })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consume events until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            info!(
                event_name = "notify.dispatch.received",
                outbound_kind = event.kind(),
                "processing outbound event"
            );
            self.handle(event).await;
        }
    }

    async fn handle(&self, event: OutboundEvent) {
        match event {
            OutboundEvent::QuoteInvitation {
                quote_request_id,
                route,
                weight_kg,
                shipment_type,
                urgency,
                notes,
                shipper_name,
                vendors,
            } => {
                for vendor in &vendors {
                    self.in_app_vendor(
                        vendor.vendor_id,
                        InAppNote::system(
                            "New quotation request",
                            format!(
                                "New request for {route}. Respond with a price and delivery \
                                 estimate."
                            ),
                            json!({ "quoteRequestId": quote_request_id }),
                        ),
                    )
                    .await;

                    let mut context = Context::new();
                    context.insert("vendor_name", &contact_name(&vendor.contact));
                    context.insert("shipper_name", &shipper_name);
                    context.insert("route", &route);
                    context.insert("weight_kg", &weight_kg);
                    context.insert("shipment_type", &shipment_type);
                    context.insert("urgency", &urgency);
                    context.insert("notes", &notes);
                    self.send_email(
                        vendor.contact.email.as_deref(),
                        format!("New quotation request from {shipper_name}"),
                        "quote_invitation.html",
                        context,
                    )
                    .await;
                }
            }

            OutboundEvent::BidReceived {
                quote_request_id,
                quote_response_id,
                route,
                declined,
                quoted_price,
                estimated_delivery,
                notes,
                requester,
            } => {
                let (title, message) = if declined {
                    (
                        "Quotation declined",
                        format!("A transporter declined the quotation for {route}."),
                    )
                } else {
                    (
                        "New quotation received",
                        format!("A transporter responded with pricing for {route}."),
                    )
                };
                self.in_app_user(
                    requester.user_id,
                    InAppNote::system(
                        title,
                        message,
                        json!({
                            "quoteRequestId": quote_request_id,
                            "quoteResponseId": quote_response_id,
                            "quotedPrice": quoted_price.map(|price| price.to_string()),
                        }),
                    ),
                )
                .await;

                let mut context = Context::new();
                context.insert("recipient_name", &contact_name(&requester.contact));
                context.insert("declined", &declined);
                context.insert("route", &route);
                context
                    .insert("quoted_price", &quoted_price.map(|price| price.to_string()));
                context.insert(
                    "estimated_delivery",
                    &estimated_delivery.as_ref().map(format_datetime),
                );
                context.insert("notes", &notes);
                self.send_email(
                    requester.contact.email.as_deref(),
                    if declined {
                        "Transporter declined your quotation request".to_string()
                    } else {
                        "New transporter quotation received".to_string()
                    },
                    "bid_received.html",
                    context,
                )
                .await;
            }

            OutboundEvent::ConsentRequested {
                shipment_id,
                quote_response_id,
                tracking_number,
                route,
                quoted_price,
                estimated_delivery,
                expires_at,
                vendor,
                requester,
            } => {
                let deadline = format_datetime(&expires_at);
                let metadata = json!({
                    "shipmentId": shipment_id,
                    "quoteResponseId": quote_response_id,
                    "expiresAt": expires_at.to_rfc3339(),
                });

                self.in_app_vendor(
                    vendor.vendor_id,
                    InAppNote::system(
                        "Booking awaiting your confirmation",
                        format!("Shipment {route} requires your consent before {deadline}."),
                        metadata.clone(),
                    ),
                )
                .await;
                self.in_app_user(
                    requester.user_id,
                    InAppNote::system(
                        "Waiting on transporter confirmation",
                        format!(
                            "Transporter {} has been notified to confirm booking for {route}.",
                            contact_name(&vendor.contact)
                        ),
                        metadata,
                    ),
                )
                .await;

                let mut context = Context::new();
                context.insert("vendor_name", &contact_name(&vendor.contact));
                context.insert("route", &route);
                context.insert("deadline", &deadline);
                context.insert("tracking_number", &tracking_number);
                context.insert("quoted_price", &quoted_price.to_string());
                context.insert("estimated_delivery", &format_datetime(&estimated_delivery));
                context.insert("shipper_name", &contact_name(&requester.contact));
                self.send_email(
                    vendor.contact.email.as_deref(),
                    "Booking awaiting your confirmation".to_string(),
                    "consent_request.html",
                    context,
                )
                .await;
                self.send_sms(
                    vendor.contact.phone.as_deref(),
                    format!("Lanehaul: booking {route} awaits your consent before {deadline}."),
                )
                .await;

                let mut context = Context::new();
                context.insert("recipient_name", &contact_name(&requester.contact));
                context.insert("route", &route);
                context.insert("status_label", "Awaiting Confirmation");
                context.insert("vendor_name", &contact_name(&vendor.contact));
                context.insert("tracking_number", &Some(tracking_number));
                context.insert("actioned_at", &Option::<String>::None);
                context.insert("note", &Option::<String>::None);
                self.send_email(
                    requester.contact.email.as_deref(),
                    "Waiting on transporter confirmation".to_string(),
                    "consent_update.html",
                    context,
                )
                .await;
                self.send_sms(
                    requester.contact.phone.as_deref(),
                    format!(
                        "Lanehaul: {} must confirm {route} before {deadline}.",
                        contact_name(&vendor.contact)
                    ),
                )
                .await;
            }

            OutboundEvent::ConsentRecorded {
                shipment_id,
                quote_response_id,
                tracking_number,
                route,
                accepted,
                note,
                actioned_at,
                vendor,
                requester,
            } => {
                let vendor_name = contact_name(&vendor.contact);
                let title = if accepted {
                    "Transporter confirmed booking"
                } else {
                    "Transporter declined booking"
                };
                let shipper_message = if accepted {
                    format!("Transporter {vendor_name} confirmed the booking for {route}.")
                } else {
                    format!("Transporter {vendor_name} declined the booking for {route}.")
                };
                let transporter_message = if accepted {
                    format!("Booking {route} marked as accepted.")
                } else {
                    format!("Booking {route} marked as declined.")
                };
                let metadata = json!({
                    "shipmentId": shipment_id,
                    "quoteResponseId": quote_response_id,
                    "note": note,
                    "consentAt": actioned_at.to_rfc3339(),
                });

                self.in_app_user(
                    requester.user_id,
                    InAppNote::system(title, shipper_message, metadata.clone()),
                )
                .await;
                self.in_app_vendor(
                    vendor.vendor_id,
                    InAppNote::system(title, transporter_message, metadata),
                )
                .await;

                let status_label = if accepted { "Accepted" } else { "Declined" };
                let mut context = Context::new();
                context.insert("recipient_name", &contact_name(&requester.contact));
                context.insert("route", &route);
                context.insert("status_label", status_label);
                context.insert("vendor_name", &vendor_name);
                context.insert("tracking_number", &tracking_number);
                context.insert("actioned_at", &Some(format_datetime(&actioned_at)));
                context.insert("note", &note);
                self.send_email(
                    requester.contact.email.as_deref(),
                    format!("Booking {}", status_label.to_ascii_lowercase()),
                    "consent_update.html",
                    context,
                )
                .await;
                self.send_sms(
                    requester.contact.phone.as_deref(),
                    format!(
                        "Lanehaul: {vendor_name} {} the booking for {route}.",
                        if accepted { "confirmed" } else { "declined" }
                    ),
                )
                .await;
            }

            OutboundEvent::ConsentExpired {
                shipment_id,
                quote_response_id,
                route,
                vendor,
                requester,
            } => {
                let vendor_name = contact_name(&vendor.contact);
                let metadata = json!({
                    "shipmentId": shipment_id,
                    "quoteResponseId": quote_response_id,
                });

                self.in_app_user(
                    requester.user_id,
                    InAppNote::system(
                        "Booking consent expired",
                        format!("Transporter {vendor_name} did not confirm {route} in time."),
                        metadata.clone(),
                    ),
                )
                .await;
                self.in_app_vendor(
                    vendor.vendor_id,
                    InAppNote::system(
                        "Booking consent expired",
                        format!("The consent window for {route} has lapsed."),
                        metadata,
                    ),
                )
                .await;

                let mut context = Context::new();
                context.insert("recipient_name", &contact_name(&requester.contact));
                context.insert("route", &route);
                context.insert("status_label", "Expired");
                context.insert("vendor_name", &vendor_name);
                context.insert("tracking_number", &Option::<String>::None);
                context.insert("actioned_at", &Option::<String>::None);
                context.insert("note", &Option::<String>::None);
                self.send_email(
                    requester.contact.email.as_deref(),
                    "Booking consent expired".to_string(),
                    "consent_update.html",
                    context,
                )
                .await;
            }

            OutboundEvent::AssignmentDecided {
                shipment_id,
                tracking_number,
                route,
                accepted,
                requester,
            } => {
                let (title, message) = if accepted {
                    (
                        "Shipment accepted",
                        format!("Your transporter confirmed the shipment {tracking_number}."),
                    )
                } else {
                    (
                        "Shipment declined",
                        format!("Your transporter declined the shipment {tracking_number}."),
                    )
                };
                self.in_app_user(
                    requester.user_id,
                    InAppNote::system(
                        title,
                        message,
                        json!({ "shipmentId": shipment_id, "route": route }),
                    ),
                )
                .await;
            }

            OutboundEvent::DriverAssigned {
                shipment_id,
                tracking_number,
                driver_name,
                driver_phone,
                vehicle_registration,
                requester,
            } => {
                self.in_app_user(
                    requester.user_id,
                    InAppNote::system(
                        "Driver assigned to your shipment",
                        format!(
                            "Driver {driver_name} will operate vehicle {vehicle_registration}."
                        ),
                        json!({
                            "shipmentId": shipment_id,
                            "driverName": driver_name,
                            "driverPhone": driver_phone,
                        }),
                    ),
                )
                .await;

                let html = format!(
                    "<p>Hi {},</p>\
                     <p>Your transporter has assigned a driver for shipment {tracking_number}.</p>\
                     <ul><li><strong>Driver:</strong> {driver_name} ({driver_phone})</li>\
                     <li><strong>Vehicle:</strong> {vehicle_registration}</li></ul>\
                     <p>You can view live updates from the shipment dashboard.</p>\
                     <p>&ndash; Lanehaul Operations</p>",
                    contact_name(&requester.contact)
                );
                if let Some(to) = requester.contact.email.as_deref() {
                    self.deliver_email(EmailMessage {
                        to: to.to_string(),
                        subject: "Driver assigned for your shipment".to_string(),
                        html,
                    })
                    .await;
                }
            }
        }
    }

    async fn in_app_user(&self, user_id: UserId, note: InAppNote) {
        if let Err(err) = self.in_app.notify_user(user_id, note).await {
            error!(
                event_name = "notify.in_app.failed",
                user_id = user_id.0,
                error = %err,
                "in-app notification failed"
            );
        }
    }

    async fn in_app_vendor(&self, vendor_id: VendorId, note: InAppNote) {
        if let Err(err) = self.in_app.notify_vendor_users(vendor_id, note).await {
            error!(
                event_name = "notify.in_app.failed",
                vendor_id = vendor_id.0,
                error = %err,
                "in-app vendor fan-out failed"
            );
        }
    }

    async fn send_email(
        &self,
        to: Option<&str>,
        subject: String,
        template: &str,
        context: Context,
    ) {
        let Some(to) = to else { return };

        let html = match self.templates.render(template, &context) {
            Ok(html) => html,
            Err(err) => {
                error!(
                    event_name = "notify.email.render_failed",
                    template,
                    error = %err,
                    "email template rendering failed"
                );
                return;
            }
        };

        self.deliver_email(EmailMessage { to: to.to_string(), subject, html }).await;
    }

    async fn deliver_email(&self, message: EmailMessage) {
        let to = message.to.clone();
        if let Err(err) = self.email.send(message).await {
            error!(
                event_name = "notify.email.failed",
                to = %to,
                error = %err,
                "email delivery failed"
            );
        }
    }

    async fn send_sms(&self, to: Option<&str>, body: String) {
        let Some(to) = to else { return };

        if let Err(err) = self.sms.send(SmsMessage { to: to.to_string(), body }).await {
            error!(
                event_name = "notify.sms.failed",
                to,
                error = %err,
                "sms delivery failed"
            );
        }
    }
}

fn contact_name(contact: &Contact) -> String {
    contact.name.clone().unwrap_or_else(|| "there".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use lanehaul_core::domain::party::{Contact, UserId, VendorId};

    use crate::email::RecordingEmailGateway;
    use crate::events::{OutboundEvent, UserRecipient, VendorRecipient};
    use crate::sms::RecordingSmsGateway;

    use super::{InMemoryInAppSink, NotificationDispatcher, RecipientKey};

    fn vendor_recipient() -> VendorRecipient {
        VendorRecipient {
            vendor_id: VendorId(5),
            contact: Contact {
                name: Some("Sharma Logistics".to_string()),
                email: Some("ops@sharma.example".to_string()),
                phone: Some("+91-98000-00000".to_string()),
            },
        }
    }

    fn requester_recipient() -> UserRecipient {
        UserRecipient {
            user_id: UserId(7),
            contact: Contact {
                name: Some("Asha".to_string()),
                email: Some("asha@lanehaul.example".to_string()),
                phone: Some("+91-99000-00000".to_string()),
            },
        }
    }

    fn consent_requested() -> OutboundEvent {
        OutboundEvent::ConsentRequested {
            shipment_id: 42,
            quote_response_id: 11,
            tracking_number: "LH-ABCDEF123456".to_string(),
            route: "Pune -> Nagpur".to_string(),
            quoted_price: Decimal::new(1000, 0),
            estimated_delivery: Utc::now() + Duration::days(3),
            expires_at: Utc::now() + Duration::hours(2),
            vendor: vendor_recipient(),
            requester: requester_recipient(),
        }
    }

    #[tokio::test]
    async fn consent_request_fans_out_to_both_parties() {
        let sink = InMemoryInAppSink::default();
        let email = RecordingEmailGateway::default();
        let sms = RecordingSmsGateway::default();
        let (dispatcher, handle) = NotificationDispatcher::new(
            Arc::new(sink.clone()),
            Arc::new(email.clone()),
            Arc::new(sms.clone()),
        );

        handle.publish(consent_requested());
        drop(handle);
        dispatcher.run().await;

        let notes = sink.notes();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().any(|(key, note)| *key == RecipientKey::Vendor(5)
            && note.title == "Booking awaiting your confirmation"));
        assert!(notes.iter().any(|(key, note)| *key == RecipientKey::User(7)
            && note.title == "Waiting on transporter confirmation"));

        let emails = email.sent();
        assert_eq!(emails.len(), 2);
        assert!(emails.iter().any(|message| message.to == "ops@sharma.example"
            && message.html.contains("LH-ABCDEF123456")));
        assert!(emails.iter().any(|message| message.to == "asha@lanehaul.example"
            && message.html.contains("Awaiting Confirmation")));

        let texts = sms.sent();
        assert_eq!(texts.len(), 2);
    }

    #[tokio::test]
    async fn missing_contact_details_skip_side_channels() {
        let sink = InMemoryInAppSink::default();
        let email = RecordingEmailGateway::default();
        let sms = RecordingSmsGateway::default();
        let (dispatcher, handle) = NotificationDispatcher::new(
            Arc::new(sink.clone()),
            Arc::new(email.clone()),
            Arc::new(sms.clone()),
        );

        let mut event = consent_requested();
        if let OutboundEvent::ConsentRequested { vendor, requester, .. } = &mut event {
            vendor.contact.email = None;
            vendor.contact.phone = None;
            requester.contact.phone = None;
        }

        handle.publish(event);
        drop(handle);
        dispatcher.run().await;

        assert_eq!(sink.notes().len(), 2, "in-app fan-out is independent of contact info");
        assert_eq!(email.sent().len(), 1, "only the requester email goes out");
        assert!(sms.sent().is_empty());
    }

    #[tokio::test]
    async fn gateway_failures_do_not_stop_other_deliveries() {
        let sink = InMemoryInAppSink::default();
        let email = RecordingEmailGateway::default();
        let sms = RecordingSmsGateway::default();
        email.fail_next_sends(true);

        let (dispatcher, handle) = NotificationDispatcher::new(
            Arc::new(sink.clone()),
            Arc::new(email.clone()),
            Arc::new(sms.clone()),
        );

        handle.publish(consent_requested());
        drop(handle);
        dispatcher.run().await;

        assert!(email.sent().is_empty(), "failing gateway records nothing");
        assert_eq!(sink.notes().len(), 2, "in-app rows still written");
        assert_eq!(sms.sent().len(), 2, "sms deliveries still attempted");
    }

    #[tokio::test]
    async fn declined_bid_notifies_the_requester() {
        let sink = InMemoryInAppSink::default();
        let email = RecordingEmailGateway::default();
        let sms = RecordingSmsGateway::default();
        let (dispatcher, handle) = NotificationDispatcher::new(
            Arc::new(sink.clone()),
            Arc::new(email.clone()),
            Arc::new(sms.clone()),
        );

        handle.publish(OutboundEvent::BidReceived {
            quote_request_id: 3,
            quote_response_id: 11,
            route: "Pune -> Nagpur".to_string(),
            declined: true,
            quoted_price: None,
            estimated_delivery: None,
            notes: None,
            requester: requester_recipient(),
        });
        drop(handle);
        dispatcher.run().await;

        let notes = sink.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].1.title, "Quotation declined");

        let emails = email.sent();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "Transporter declined your quotation request");
        assert!(emails[0].html.contains("declined to bid"));
    }
}
