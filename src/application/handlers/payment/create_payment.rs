//! CreatePaymentHandler - Command handler for registering a new payment.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::currency::CurrencyConverter;
use crate::domain::foundation::EnrollmentId;
use crate::domain::payment::{
    Currency, NewPayment, AMOUNT_LIMIT, PaymentError, PaymentKind, PaymentMethod, PaymentRecord,
};
use crate::ports::PaymentRepository;

/// Command to create a payment.
#[derive(Debug, Clone)]
pub struct CreatePaymentCommand {
    pub amount: Decimal,
    pub currency: Currency,
    pub method: PaymentMethod,
    /// Client reference; generated when absent.
    pub reference: Option<String>,
    /// Set for enrollment payments.
    pub enrollment_id: Option<EnrollmentId>,
    pub notes: Option<String>,
    pub receipt_ref: Option<String>,
}

/// Handler for creating payments.
///
/// Fixes both currency amounts at creation and stores the record as PENDING.
pub struct CreatePaymentHandler {
    repository: Arc<PaymentRepository>,
    converter: CurrencyConverter,
}

impl CreatePaymentHandler {
    pub fn new(repository: Arc<PaymentRepository>, converter: CurrencyConverter) -> Self {
        Self {
            repository,
            converter,
        }
    }

    pub async fn handle(&self, cmd: CreatePaymentCommand) -> Result<PaymentRecord, PaymentError> {
        // Reject before touching the FX feed.
        if cmd.amount <= Decimal::ZERO || cmd.amount >= AMOUNT_LIMIT {
            return Err(PaymentError::InvalidAmount(cmd.amount));
        }

        let amounts = self.converter.get_both_amounts(cmd.amount, cmd.currency).await?;
        let kind = match cmd.enrollment_id {
            Some(enrollment_id) => PaymentKind::Enrollment { enrollment_id },
            None => PaymentKind::General,
        };
        let record = PaymentRecord::create(
            NewPayment {
                kind,
                amount: cmd.amount,
                currency: cmd.currency,
                method: cmd.method,
                reference: cmd
                    .reference
                    .unwrap_or_else(|| format!("PAY-{}", Uuid::new_v4().simple())),
                notes: cmd.notes,
                receipt_ref: cmd.receipt_ref,
            },
            amounts,
        )?;

        self.repository.insert(&record).await?;

        tracing::info!(
            payment_id = %record.id,
            reference = %record.provider_reference,
            amount = %record.amount,
            currency = %record.currency,
            "payment created"
        );
        Ok(record)
    }
}
