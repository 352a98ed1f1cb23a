//! Customer-facing notices for status changes.
//!
//! Shaping only: the emitter never performs I/O and never fails. Delivery
//! belongs to whatever consumes [`Notification`] values downstream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::currency::Currency;
use super::status::PaymentStatus;
use crate::domain::foundation::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// A structured notice ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Id of the payment or donation the notice is about.
    pub correlated_id: String,
    pub timestamp: Timestamp,
}

/// What the emitter knows about the record. Every field but the id is optional.
#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub entity: Option<&'static str>,
    pub correlated_id: String,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub reason: Option<String>,
}

impl NotificationContext {
    pub fn new(correlated_id: impl ToString) -> Self {
        Self {
            correlated_id: correlated_id.to_string(),
            ..Default::default()
        }
    }

    pub fn entity(mut self, entity: &'static str) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn amount(mut self, amount: Decimal, currency: Currency) -> Self {
        self.amount = Some(amount);
        self.currency = Some(currency);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

pub struct NotificationEmitter;

impl NotificationEmitter {
    /// Builds the notice for a record that just reached `status`.
    pub fn emit(status: PaymentStatus, ctx: &NotificationContext) -> Notification {
        let subject = match ctx.entity {
            Some("donation") => "donation",
            _ => "payment",
        };
        let amount = match (ctx.amount, ctx.currency) {
            (Some(amount), Some(currency)) => format!("{:.2} {}", amount, currency),
            (Some(amount), None) => format!("{:.2}", amount),
            _ => "an unspecified amount".to_string(),
        };

        let (kind, title, message) = match status {
            PaymentStatus::Success => (
                NotificationKind::Success,
                "Payment confirmed",
                format!("Your {} of {} was processed successfully.", subject, amount),
            ),
            PaymentStatus::Failed => (
                NotificationKind::Error,
                "Payment failed",
                format!(
                    "Your {} of {} could not be processed: {}.",
                    subject,
                    amount,
                    ctx.reason.as_deref().unwrap_or("no reason given")
                ),
            ),
            PaymentStatus::Refunded => (
                NotificationKind::Info,
                "Refund processed",
                format!("A refund of {} was issued for your {}.", amount, subject),
            ),
            PaymentStatus::Processing => (
                NotificationKind::Info,
                "Payment in progress",
                format!("Your {} of {} is being processed.", subject, amount),
            ),
            PaymentStatus::Pending => (
                NotificationKind::Info,
                "Payment registered",
                format!("Your {} of {} is awaiting processing.", subject, amount),
            ),
        };

        Notification {
            kind,
            title: title.to_string(),
            message,
            correlated_id: ctx.correlated_id.clone(),
            timestamp: Timestamp::now(),
        }
    }
}
