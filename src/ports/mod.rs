//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the settlement domain and the outside world. Adapters implement them.
//!
//! ## Provider Ports
//!
//! - `ProviderGateway` - create/confirm/refund at a payment provider
//! - `WebhookVerifier` - signature check and event normalisation
//! - `RateSource` - foreign-exchange rate feed
//!
//! ## Persistence
//!
//! - `SettlementRepository` - payments and donations, compare-and-swap writes
//!
//! ## Collaborators
//!
//! - `EnrollmentNotifier`, `AuditSink`, `NotificationSink`

mod audit_sink;
mod enrollment_notifier;
mod notification_sink;
mod payment_gateway;
mod rate_source;
mod settlement_repository;
mod webhook_verifier;

pub use audit_sink::AuditSink;
pub use enrollment_notifier::EnrollmentNotifier;
pub use notification_sink::NotificationSink;
pub use payment_gateway::{
    GatewayError, GatewayErrorCode, IntentRequest, IntentStatus, ProviderGateway, ProviderIntent,
    ProviderRefund, RefundRequest,
};
pub use rate_source::{RateSource, RateSourceError};
pub use settlement_repository::{
    DonationRepository, PaymentRepository, SettlementRepository, TransitionOutcome,
};
pub use webhook_verifier::WebhookVerifier;
