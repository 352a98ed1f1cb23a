//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod payment;

pub use payment::{
    CreateDonationCommand, CreateDonationHandler, CreatePaymentCommand, CreatePaymentHandler,
    ForceFailHandler, GetRecordHandler, PaymentProcessor, ProcessOutcome, ReconcileResult,
    ReconcileWebhookCommand, ReconciliationSweeper, RefundCommand, RefundHandler, RefundResult,
    SweepConfig, SweepReport, WebhookReconciler,
};
