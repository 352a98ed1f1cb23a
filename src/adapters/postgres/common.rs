//! Column codecs and error mapping shared by the settlement repositories.

use std::str::FromStr;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::payment::{Currency, PaymentMethod, PaymentStatus};

const UNIQUE_CONSTRAINTS: &[&str] = &[
    "payments_provider_reference_key",
    "payments_enrollment_id_key",
    "donations_provider_reference_key",
];

/// Maps a write failure, turning unique violations into `DuplicateReference`.
pub(super) fn map_write_error(e: sqlx::Error, what: &str, reference: Option<&str>) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if let Some(constraint) = db_err.constraint() {
            if UNIQUE_CONSTRAINTS.contains(&constraint) {
                return DomainError::new(
                    ErrorCode::DuplicateReference,
                    format!("{} violates {}", what, constraint),
                )
                .with_detail("reference", reference.unwrap_or(constraint));
            }
        }
    }
    DomainError::database(format!("Failed to {}: {}", what, e))
}

pub(super) fn read_error(e: sqlx::Error, what: &str) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", what, e))
}

pub(super) fn parse_status(s: &str) -> Result<PaymentStatus, DomainError> {
    PaymentStatus::from_str(s).map_err(|e| DomainError::database(format!("Invalid status value: {}", e)))
}

pub(super) fn parse_currency(s: &str) -> Result<Currency, DomainError> {
    Currency::from_str(s).map_err(|e| DomainError::database(format!("Invalid currency value: {}", e)))
}

pub(super) fn parse_method(s: &str) -> Result<PaymentMethod, DomainError> {
    PaymentMethod::from_str(s).map_err(|e| DomainError::database(format!("Invalid method value: {}", e)))
}
