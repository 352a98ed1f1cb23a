//! Payment records, general and enrollment-linked.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::currency::{Currency, CurrencyAmounts};
use super::errors::PaymentError;
use super::method::PaymentMethod;
use super::settlement::{checked_transition, ensure_valid_amount, Settleable};
use super::status::PaymentStatus;
use crate::domain::foundation::{EnrollmentId, PaymentId, Timestamp, ValidationError};

/// What a payment pays for. Selects the side-effect strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentKind {
    General,
    Enrollment { enrollment_id: EnrollmentId },
}

impl PaymentKind {
    pub fn enrollment_id(&self) -> Option<EnrollmentId> {
        match self {
            PaymentKind::General => None,
            PaymentKind::Enrollment { enrollment_id } => Some(*enrollment_id),
        }
    }
}

/// Input for creating a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub kind: PaymentKind,
    pub amount: Decimal,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub reference: String,
    pub notes: Option<String>,
    pub receipt_ref: Option<String>,
}

/// A monetary transaction settled through a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub kind: PaymentKind,
    pub amount: Decimal,
    pub currency: Currency,
    pub amount_domestic: Decimal,
    pub amount_foreign: Decimal,
    pub method: PaymentMethod,
    pub provider_reference: String,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    /// Opaque key of a receipt held by the storage service.
    pub receipt_ref: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentRecord {
    /// Creates a pending payment. Both currency amounts are fixed here.
    pub fn create(input: NewPayment, amounts: CurrencyAmounts) -> Result<Self, PaymentError> {
        ensure_valid_amount(input.amount)?;
        let reference = input.reference.trim().to_string();
        if reference.is_empty() {
            return Err(ValidationError::empty_field("reference").into());
        }

        let now = Timestamp::now();
        Ok(Self {
            id: PaymentId::new(),
            kind: input.kind,
            amount: input.amount,
            currency: input.currency,
            amount_domestic: amounts.domestic,
            amount_foreign: amounts.foreign,
            method: input.method,
            provider_reference: reference,
            status: PaymentStatus::Pending,
            notes: input.notes,
            receipt_ref: input.receipt_ref,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Settleable for PaymentRecord {
    type Id = PaymentId;
    const ENTITY: &'static str = "payment";

    fn id(&self) -> PaymentId {
        self.id
    }

    fn status(&self) -> PaymentStatus {
        self.status
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn currency(&self) -> Currency {
        self.currency
    }

    fn provider_reference(&self) -> Option<&str> {
        Some(&self.provider_reference)
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn description(&self) -> String {
        match self.kind {
            PaymentKind::General => format!("Payment {}", self.provider_reference),
            PaymentKind::Enrollment { enrollment_id } => {
                format!("Enrollment {} payment", enrollment_id)
            }
        }
    }

    fn idempotency_key(&self) -> String {
        format!("payment-{}", self.id)
    }

    fn enrollment_id(&self) -> Option<EnrollmentId> {
        self.kind.enrollment_id()
    }

    fn apply_status(
        &mut self,
        target: PaymentStatus,
        at: Timestamp,
    ) -> Result<PaymentStatus, PaymentError> {
        let previous = self.status;
        self.status = checked_transition(previous, target)?;
        self.updated_at = at;
        Ok(previous)
    }

    fn assign_provider_reference(&mut self, reference: String) {
        self.provider_reference = reference;
    }
    fn touch(&mut self, at: Timestamp) {
        self.updated_at = at;
    }
}
