pub mod connection;
pub mod fixtures;
pub mod lifecycle;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use lifecycle::{
    ApprovalOutcome, AssignmentOutcome, BidCommand, BidOutcome, BookingLifecycle, ConsentOutcome,
    DriverAssignment, DriverOutcome, ExpiredConsent, LifecycleError, NewQuoteRequest,
    QuoteCreation,
};
pub use repositories::{NewNotification, NewSyncRecord, NotificationRecord, RepositoryError};
