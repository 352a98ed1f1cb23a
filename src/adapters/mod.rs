//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the settlement core to external systems:
//! - `stripe`, `paypal` - provider gateways and webhook verifiers
//! - `bounded_gateway` - concurrency and deadline limits around any gateway
//! - `exchange` - HTTP exchange-rate feed
//! - `postgres` - durable payment and donation storage
//! - `events` - audit log, notification broadcast, enrollment callback
//! - `memory` - in-process implementations for tests and local runs
//! - `http` - REST API

pub mod bounded_gateway;
pub mod events;
pub mod exchange;
pub mod http;
pub mod memory;
pub mod paypal;
pub mod postgres;
pub mod stripe;

pub use bounded_gateway::BoundedGateway;
pub use events::{BroadcastNotificationSink, HttpEnrollmentNotifier, TracingAuditSink};
pub use exchange::HttpRateSource;
pub use http::{build_router, HttpOptions, PaymentAppState};
pub use memory::{InMemorySettlementRepository, MockGateway};
pub use paypal::{PayPalConfig, PayPalGateway, PayPalWebhookVerifier};
pub use postgres::{PostgresDonationRepository, PostgresPaymentRepository};
pub use stripe::{StripeConfig, StripeGateway, StripeWebhookVerifier};
