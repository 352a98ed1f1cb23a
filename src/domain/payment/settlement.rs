//! Behaviour shared by everything that settles through a provider.

use rust_decimal::Decimal;
use std::fmt;
use std::hash::Hash;

use super::cascade::EnrollmentOutcome;
use super::currency::Currency;
use super::errors::PaymentError;
use super::status::PaymentStatus;
use crate::domain::foundation::{EnrollmentId, StateMachine, Timestamp};

/// A record whose status is driven by a payment provider.
///
/// Payments and donations share the status graph and the processing
/// flow; they differ in identity, description and side effects.
pub trait Settleable: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + Send + Sync + 'static;

    /// Audit and error label, e.g. `"payment"`.
    const ENTITY: &'static str;

    fn id(&self) -> Self::Id;
    fn status(&self) -> PaymentStatus;
    fn amount(&self) -> Decimal;
    fn currency(&self) -> Currency;
    fn provider_reference(&self) -> Option<&str>;
    fn created_at(&self) -> Timestamp;
    fn updated_at(&self) -> Timestamp;

    /// Text sent to the provider with the intent.
    fn description(&self) -> String;

    /// Key that makes a re-issued provider call return the same transaction.
    fn idempotency_key(&self) -> String;

    /// Enrollment this record pays for, if any.
    fn enrollment_id(&self) -> Option<EnrollmentId> {
        None
    }

    /// Side effect owed to the enrollment collaborator for `status`.
    fn cascade(&self, status: PaymentStatus) -> Option<(EnrollmentId, EnrollmentOutcome)> {
        let enrollment_id = self.enrollment_id()?;
        EnrollmentOutcome::for_status(status).map(|outcome| (enrollment_id, outcome))
    }

    /// Applies a validated status change, returning the previous status.
    fn apply_status(
        &mut self,
        target: PaymentStatus,
        at: Timestamp,
    ) -> Result<PaymentStatus, PaymentError>;

    /// Replaces the client reference with the provider's transaction id.
    fn assign_provider_reference(&mut self, reference: String);

    /// Moves `updated_at` without a status change.
    fn touch(&mut self, at: Timestamp);
}

/// Checks a transition against the status graph.
pub(crate) fn checked_transition(
    current: PaymentStatus,
    target: PaymentStatus,
) -> Result<PaymentStatus, PaymentError> {
    current
        .transition_to(target)
        .map_err(|_| PaymentError::InvalidTransition {
            from: current,
            to: target,
        })
}

/// Exclusive upper bound on stored amounts; columns are NUMERIC(12,2).
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(1410065408, 2, 0, false, 0);

/// Rejects non-positive amounts and amounts storage cannot hold.
pub(crate) fn ensure_valid_amount(amount: Decimal) -> Result<(), PaymentError> {
    if amount <= Decimal::ZERO || amount >= AMOUNT_LIMIT {
        return Err(PaymentError::InvalidAmount(amount));
    }
    Ok(())
}
