pub mod config;
pub mod domain;
pub mod errors;
pub mod policy;

pub use domain::consent_log::{ConsentActor, ConsentLogEntry};
pub use domain::party::{Actor, CompanyId, Contact, Role, User, UserId, Vendor, VendorId};
pub use domain::quote::{QuoteRequest, QuoteRequestId, QuoteRequestStatus, QuoteResponseId};
pub use domain::response::{
    ConsentAction, ConsentDecision, ConsentSource, ConsentStatus, QuoteResponse,
    QuoteResponseStatus,
};
pub use domain::shipment::{
    AssignmentAction, BookingStatus, Shipment, ShipmentId, ShipmentStatus,
};
pub use errors::DomainError;
