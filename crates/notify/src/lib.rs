//! Outbound notification dispatch.
//!
//! Post-commit side effects publish typed [`events::OutboundEvent`]s to a
//! bounded channel; a dispatcher task consumes them and performs the in-app,
//! email, and SMS deliveries. Delivery failures are logged individually and
//! never reach the HTTP caller.
//!
//! # Key Types
//!
//! - `DispatcherHandle` - cheap clone handed to request handlers; `publish` is
//!   non-blocking and best-effort
//! - `NotificationDispatcher` - the consumer loop
//! - `InAppSink` - where in-app notification rows are written
//! - `EmailGateway` / `SmsGateway` - outbound transports with HTTP and no-op
//!   implementations

pub mod dispatcher;
pub mod email;
pub mod events;
pub mod sms;

pub use dispatcher::{DispatcherHandle, InAppNote, InAppSink, NotificationDispatcher, SinkError};
pub use email::{
    EmailGateway, EmailMessage, GatewayError, HttpEmailGateway, NoopEmailGateway,
    RecordingEmailGateway,
};
pub use events::{OutboundEvent, UserRecipient, VendorRecipient};
pub use sms::{HttpSmsGateway, NoopSmsGateway, RecordingSmsGateway, SmsGateway, SmsMessage};
