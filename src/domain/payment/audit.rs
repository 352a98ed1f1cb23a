//! Audit events for status transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::PaymentStatus;
use crate::domain::foundation::Timestamp;

/// Who caused a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Actor {
    /// Synchronous processing path.
    System,
    /// Provider webhook, named by provider.
    Webhook(String),
    /// Periodic reconciliation pass.
    Sweep,
    /// Back-office user.
    Operator(String),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Webhook(provider) => write!(f, "webhook:{}", provider),
            Actor::Sweep => f.write_str("sweep"),
            Actor::Operator(name) => write!(f, "operator:{}", name),
        }
    }
}

/// Emitted for every status write, whichever path made it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChanged {
    pub entity_type: &'static str,
    pub entity_id: String,
    pub old_status: PaymentStatus,
    pub new_status: PaymentStatus,
    pub actor: Actor,
    pub timestamp: Timestamp,
}
