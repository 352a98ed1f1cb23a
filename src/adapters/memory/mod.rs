//! In-memory adapters.
//!
//! Contract-faithful stand-ins for the database, providers and
//! collaborators. Tests build on them; `main` falls back to them when
//! no database URL is configured.

mod collaborators;
mod gateway;
mod rate_source;
mod settlement_repository;

pub use collaborators::{InMemoryNotificationSink, RecordingAuditSink, RecordingEnrollmentNotifier};
pub use gateway::{GatewayCall, MockGateway};
pub use rate_source::{FailingRateSource, FixedRateSource};
pub use settlement_repository::InMemorySettlementRepository;
