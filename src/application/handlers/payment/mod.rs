//! Payment and donation handlers.
//!
//! Commands that create, settle, refund and reconcile payment records.
//! Handlers are generic over [`Settleable`](crate::domain::payment::Settleable)
//! where payments and donations share the same lifecycle.

mod create_donation;
mod create_payment;
mod force_fail;
mod get_record;
mod process_payment;
mod reconcile_webhook;
mod refund_payment;
mod sweep_processing;

pub use create_donation::{CreateDonationCommand, CreateDonationHandler};
pub use create_payment::{CreatePaymentCommand, CreatePaymentHandler};
pub use force_fail::ForceFailHandler;
pub use get_record::GetRecordHandler;
pub use process_payment::{PaymentProcessor, ProcessOutcome};
pub use reconcile_webhook::{ReconcileResult, ReconcileWebhookCommand, WebhookReconciler};
pub use refund_payment::{RefundCommand, RefundHandler, RefundResult};
pub use sweep_processing::{ReconciliationSweeper, SweepConfig, SweepReport};
