//! Settlement error taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;

use super::status::PaymentStatus;
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors surfaced by the settlement core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    #[error("Unsupported currency: {0}")]
    InvalidCurrency(String),

    #[error("Provider reference already in use: {0}")]
    DuplicateReference(String),

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: PaymentStatus, to: PaymentStatus },

    #[error("Already processed (status {0})")]
    AlreadyProcessed(PaymentStatus),

    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl PaymentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PaymentError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable error code for API responses.
    pub fn code(&self) -> ErrorCode {
        match self {
            PaymentError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            PaymentError::InvalidCurrency(_) => ErrorCode::InvalidCurrency,
            PaymentError::DuplicateReference(_) => ErrorCode::DuplicateReference,
            PaymentError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            PaymentError::AlreadyProcessed(_) => ErrorCode::AlreadyProcessed,
            PaymentError::Provider { .. } => ErrorCode::ProviderError,
            PaymentError::InvalidSignature => ErrorCode::InvalidSignature,
            PaymentError::NotFound { entity: "donation", .. } => ErrorCode::DonationNotFound,
            PaymentError::NotFound { .. } => ErrorCode::PaymentNotFound,
            PaymentError::Validation(_) => ErrorCode::ValidationFailed,
            PaymentError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }
}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::DuplicateReference => PaymentError::DuplicateReference(
                err.details
                    .get("reference")
                    .cloned()
                    .unwrap_or(err.message),
            ),
            ErrorCode::PaymentNotFound => PaymentError::NotFound {
                entity: "payment",
                id: err.details.get("id").cloned().unwrap_or_default(),
            },
            ErrorCode::DonationNotFound => PaymentError::NotFound {
                entity: "donation",
                id: err.details.get("id").cloned().unwrap_or_default(),
            },
            _ => PaymentError::Infrastructure(err.to_string()),
        }
    }
}
