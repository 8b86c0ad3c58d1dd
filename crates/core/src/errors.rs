use thiserror::Error;

use crate::domain::quote::QuoteRequestStatus;
use crate::domain::response::QuoteResponseStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote request transition from {from:?} to {to:?}")]
    InvalidQuoteTransition { from: QuoteRequestStatus, to: QuoteRequestStatus },
    #[error("invalid quote response transition from {from:?} to {to:?}")]
    InvalidResponseTransition { from: QuoteResponseStatus, to: QuoteResponseStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
