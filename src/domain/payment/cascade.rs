//! Enrollment side effects of payment outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::PaymentStatus;

/// Outcome reported to the enrollment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentOutcome {
    Paid,
    Unpaid,
    Cancelled,
}

impl EnrollmentOutcome {
    /// Outcome owed for a status write, if any.
    pub fn for_status(status: PaymentStatus) -> Option<Self> {
        match status {
            PaymentStatus::Success => Some(EnrollmentOutcome::Paid),
            PaymentStatus::Failed => Some(EnrollmentOutcome::Unpaid),
            PaymentStatus::Refunded => Some(EnrollmentOutcome::Cancelled),
            PaymentStatus::Pending | PaymentStatus::Processing => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentOutcome::Paid => "PAID",
            EnrollmentOutcome::Unpaid => "UNPAID",
            EnrollmentOutcome::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for EnrollmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
