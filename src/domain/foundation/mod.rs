//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine contract and
//! error types used across the settlement domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{DonationId, EnrollmentId, PaymentId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
