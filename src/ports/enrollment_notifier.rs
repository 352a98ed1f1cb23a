//! Enrollment collaborator port.
//!
//! The scheduling subsystem owns enrollments and seat counts; settlement
//! only tells it how a payment ended.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EnrollmentId};
use crate::domain::payment::EnrollmentOutcome;

#[async_trait]
pub trait EnrollmentNotifier: Send + Sync {
    async fn on_payment_outcome(
        &self,
        enrollment_id: EnrollmentId,
        outcome: EnrollmentOutcome,
    ) -> Result<(), DomainError>;
}
