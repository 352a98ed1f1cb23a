//! Payment lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::StateMachine;

/// Settlement status shared by payments and donations.
///
/// `Pending -> Processing -> {Success, Failed}` and `Success -> Refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Success,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    /// Path of intermediate states needed to reach `target` from here.
    ///
    /// Webhooks may report an outcome for a record that never left
    /// `Pending`; the record then steps through `Processing`.
    pub fn path_to(&self, target: PaymentStatus) -> Option<Vec<PaymentStatus>> {
        if self.can_transition_to(&target) {
            return Some(vec![target]);
        }
        if *self == PaymentStatus::Pending
            && PaymentStatus::Processing.can_transition_to(&target)
        {
            return Some(vec![PaymentStatus::Processing, target]);
        }
        None
    }
}

impl StateMachine for PaymentStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            PaymentStatus::Pending => vec![PaymentStatus::Processing],
            PaymentStatus::Processing => vec![PaymentStatus::Success, PaymentStatus::Failed],
            PaymentStatus::Success => vec![PaymentStatus::Refunded],
            PaymentStatus::Failed | PaymentStatus::Refunded => vec![],
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown payment status: {}", s))
    }
}
